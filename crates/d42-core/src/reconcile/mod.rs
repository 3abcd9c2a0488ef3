// ── Reconciliation ──
//
// Create/read/update/delete state machines for each managed resource.
// Every reconciler follows the same rules:
//
// - the identifier is bound only after the primary create *and* its
//   custom-field write both succeed
// - a read that finds the object missing clears the binding without error
// - an update writes only what its plan lists, one call per custom field
// - delete is best-effort unless the policy asks otherwise

pub mod device;
pub mod password;

use std::fmt;

use tracing::{info, warn};

use d42_api::RemoteId;

use crate::config::ReconcilePolicy;
use crate::error::{CoreError, Operation};
use crate::model::{CustomFieldChange, ResourceState};

pub use device::DeviceReconciler;
pub use password::PasswordReconciler;

// ── Plan ─────────────────────────────────────────────────────────────

/// A fixed-schema field whose remote value differs from the desired one.
#[derive(Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub field: &'static str,
    pub old: Option<String>,
    pub new: Option<String>,
    /// Values are withheld from `Debug` and `Display`.
    pub sensitive: bool,
}

impl AttributeChange {
    /// Compare two optional values, treating empty strings as unset.
    pub(crate) fn between(field: &'static str, old: Option<&str>, new: Option<&str>) -> Option<Self> {
        let old = old.filter(|v| !v.is_empty());
        let new = new.filter(|v| !v.is_empty());
        (old != new).then(|| Self {
            field,
            old: old.map(str::to_owned),
            new: new.map(str::to_owned),
            sensitive: false,
        })
    }

    pub(crate) fn secret(field: &'static str) -> Self {
        Self {
            field,
            old: None,
            new: None,
            sensitive: true,
        }
    }
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            return write!(f, "{}: (sensitive value changed)", self.field);
        }
        write!(
            f,
            "{}: {} -> {}",
            self.field,
            self.old.as_deref().unwrap_or("(unset)"),
            self.new.as_deref().unwrap_or("(unset)")
        )
    }
}

impl fmt::Debug for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeChange({self})")
    }
}

/// Everything an update will write, computed from desired and last-read state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Fixed-schema changes, applied together in one write.
    pub attributes: Vec<AttributeChange>,
    /// Custom-field changes, applied one write per key.
    pub custom_fields: Vec<CustomFieldChange>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.custom_fields.is_empty()
    }

    /// Number of remote writes applying this plan takes.
    pub fn write_count(&self) -> usize {
        usize::from(!self.attributes.is_empty()) + self.custom_fields.len()
    }
}

// ── Delete outcome ───────────────────────────────────────────────────

/// Result of a delete that did not return an error.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// Nothing was bound; no call was made.
    NotBound,
    /// The server confirmed the delete.
    Deleted,
    /// The server call failed but the policy marks the resource deleted anyway.
    /// The remote object may still exist.
    RemoteFailed(d42_api::Error),
}

// ── Shared transitions ───────────────────────────────────────────────

/// Apply the outcome of a read to `state`.
pub(crate) fn settle_read<O>(
    policy: ReconcilePolicy,
    state: &mut ResourceState<O>,
    resource: &str,
    result: Result<O, d42_api::Error>,
) -> Result<(), CoreError> {
    match result {
        Ok(observed) => {
            state.refresh(observed);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            warn!(resource, "not found on server; clearing identifier");
            state.clear();
            Ok(())
        }
        Err(e) if e.is_transport() && policy.transport_errors_as_absent => {
            warn!(resource, error = %e, "read failed at transport level; treating as absent");
            state.clear();
            Ok(())
        }
        Err(e) => Err(CoreError::remote(Operation::Read, resource, e)),
    }
}

/// Apply the outcome of a delete call to `state`.
pub(crate) fn settle_delete<O>(
    policy: ReconcilePolicy,
    state: &mut ResourceState<O>,
    resource: &str,
    id: RemoteId,
    result: Result<(), d42_api::Error>,
) -> Result<DeleteOutcome, CoreError> {
    match result {
        Ok(()) => {
            info!(resource, %id, "deleted");
            state.clear();
            Ok(DeleteOutcome::Deleted)
        }
        Err(e) if policy.surface_delete_failures => {
            Err(CoreError::remote(Operation::Delete, resource, e))
        }
        Err(e) => {
            warn!(resource, %id, error = %e, "remote delete failed; marking deleted locally");
            state.clear();
            Ok(DeleteOutcome::RemoteFailed(e))
        }
    }
}

/// Read back after a write. The write already succeeded, so a failed
/// read-back keeps the binding and leaves the last observed state in place.
pub(crate) fn settle_read_back<O>(
    state: &mut ResourceState<O>,
    resource: &str,
    result: Result<O, d42_api::Error>,
) {
    match result {
        Ok(observed) => state.refresh(observed),
        Err(e) => warn!(resource, error = %e, "read-back after write failed; keeping identifier"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn attribute_change_ignores_empty_versus_unset() {
        assert!(AttributeChange::between("notes", None, Some("")).is_none());
        assert!(AttributeChange::between("notes", Some("a"), Some("a")).is_none());
        let change = AttributeChange::between("notes", Some("a"), None).unwrap();
        assert_eq!(change.to_string(), "notes: a -> (unset)");
    }

    #[test]
    fn sensitive_change_hides_values() {
        let change = AttributeChange::secret("password");
        assert_eq!(change.to_string(), "password: (sensitive value changed)");
        assert!(!format!("{change:?}").contains("->"));
    }

    #[test]
    fn write_count_groups_attributes() {
        let plan = Plan {
            attributes: vec![AttributeChange::secret("password"), AttributeChange::secret("label")],
            custom_fields: vec![CustomFieldChange {
                key: "env".into(),
                old: None,
                new: "prod".into(),
            }],
        };
        assert_eq!(plan.write_count(), 2);
        assert!(Plan::default().is_empty());
    }
}
