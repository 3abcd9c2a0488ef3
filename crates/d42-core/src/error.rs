// ── Core error types ──
//
// Errors surfaced to the orchestration layer. Every remote failure carries
// the lifecycle operation and the resource identity so a user can act on it
// without digging through logs.

use thiserror::Error;

use d42_api::RemoteId;

/// Lifecycle operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Setup ────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid {resource}: {message}")]
    Validation { resource: String, message: String },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("{operation} of {resource} failed: {source}")]
    Remote {
        operation: Operation,
        resource: String,
        #[source]
        source: d42_api::Error,
    },

    /// The primary object exists remotely but its custom fields were not
    /// written. The binding stays empty so the caller re-runs the create;
    /// the object with `orphan_id` is left behind.
    #[error(
        "{resource} was created as id {orphan_id} but writing its custom fields failed; \
         the identifier was left unset and id {orphan_id} is orphaned: {source}"
    )]
    PartialCreate {
        resource: String,
        orphan_id: RemoteId,
        #[source]
        source: d42_api::Error,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("{resource}: '{field}' cannot change in place, the resource must be replaced")]
    RequiresReplacement {
        resource: String,
        field: &'static str,
    },

    #[error("{resource} has no bound identifier")]
    NotBound { resource: String },

    #[error("{resource} is already bound to id {id}")]
    AlreadyBound { resource: String, id: RemoteId },
}

impl CoreError {
    pub(crate) fn remote(operation: Operation, resource: &str, source: d42_api::Error) -> Self {
        Self::Remote {
            operation,
            resource: resource.to_owned(),
            source,
        }
    }

    /// The underlying API error, if this error came from a remote call.
    pub fn api_error(&self) -> Option<&d42_api::Error> {
        match self {
            Self::Remote { source, .. } | Self::PartialCreate { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The operation that failed, if this error came from a remote call.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Remote { operation, .. } => Some(*operation),
            Self::PartialCreate { .. } => Some(Operation::Create),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_names_operation_and_resource() {
        let err = CoreError::remote(
            Operation::Update,
            "device 'db01'",
            d42_api::Error::Api {
                code: 1,
                message: "bad key".into(),
            },
        );
        let text = err.to_string();
        assert!(text.starts_with("update of device 'db01' failed"), "got: {text}");
        assert!(text.contains("bad key"));
        assert_eq!(err.operation(), Some(Operation::Update));
        assert_eq!(err.api_error().and_then(d42_api::Error::api_error_code), Some(1));
    }

    #[test]
    fn partial_create_mentions_orphan() {
        let err = CoreError::PartialCreate {
            resource: "device 'db01'".into(),
            orphan_id: RemoteId::new(42),
            source: d42_api::Error::Api {
                code: 3,
                message: "no such field".into(),
            },
        };
        assert!(err.to_string().contains("id 42 is orphaned"));
        assert_eq!(err.operation(), Some(Operation::Create));
    }
}
