// ── Credential record domain types ──

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use d42_api::{PasswordFields, RemoteId};

use super::custom_fields::CustomFieldMapping;
use crate::error::CoreError;

/// Desired state of a credential record.
#[derive(Debug, Clone)]
pub struct DesiredPassword {
    pub username: String,
    pub password: SecretString,
    pub label: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    /// Name of the device this credential belongs to.
    pub device: Option<String>,
    /// Application component this credential belongs to.
    pub appcomp: Option<String>,
    /// Ask the server for the plain-text secret on read. When off, the
    /// secret is never compared and cannot drift.
    pub plain_text: bool,
    pub custom_fields: CustomFieldMapping,
}

impl DesiredPassword {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            label: None,
            category: None,
            notes: None,
            device: None,
            appcomp: None,
            plain_text: true,
            custom_fields: CustomFieldMapping::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_custom_field(mut self, key: impl Into<String>, value: impl Into<d42_api::LooseValue>) -> Self {
        self.custom_fields.insert(key, value);
        self
    }

    /// `password 'user@label'`, or `password 'user'` without a label.
    pub fn identity(&self) -> String {
        match self.label.as_deref().filter(|l| !l.is_empty()) {
            Some(label) => format!("password '{}@{label}'", self.username),
            None => format!("password '{}'", self.username),
        }
    }

    pub(crate) fn fields(&self) -> PasswordFields<'_> {
        PasswordFields {
            username: &self.username,
            password: &self.password,
            label: self.label.as_deref(),
            notes: self.notes.as_deref(),
            category: self.category.as_deref(),
            device: self.device.as_deref(),
            appcomp: self.appcomp.as_deref(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        let resource = self.identity();
        if self.username.trim().is_empty() {
            return Err(CoreError::Validation {
                resource,
                message: "username must not be empty".into(),
            });
        }
        self.custom_fields.check_representable(&resource)
    }
}

/// Credential record as last read from the server.
#[derive(Debug, Clone)]
pub struct ObservedPassword {
    pub id: RemoteId,
    pub username: String,
    /// Present only when the record was read in plain-text mode.
    pub password: Option<SecretString>,
    pub label: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub device: Option<String>,
    pub appcomp: Option<String>,
    pub custom_fields: CustomFieldMapping,
    pub last_pw_change: Option<DateTime<Utc>>,
    pub first_added: Option<DateTime<Utc>>,
}

impl ObservedPassword {
    pub fn identity(&self) -> String {
        match self.label.as_deref() {
            Some(label) => format!("password '{}@{label}'", self.username),
            None => format!("password '{}'", self.username),
        }
    }
}
