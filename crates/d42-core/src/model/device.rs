// ── Device domain types ──

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};

use d42_api::RemoteId;

use super::custom_fields::CustomFieldMapping;
use crate::error::CoreError;

/// Device type accepted by the device create endpoint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceType {
    Physical,
    #[default]
    Virtual,
    Blade,
    Cluster,
    Other,
}

impl DeviceType {
    /// Parse a user-supplied type, naming the accepted values on failure.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        Self::from_str(raw.trim()).map_err(|_| CoreError::Validation {
            resource: "device type".into(),
            message: format!(
                "'{raw}' is not one of: {}",
                Self::VARIANTS.join(", ")
            ),
        })
    }
}

/// Desired state of a device as declared by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredDevice {
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: DeviceType,
    #[serde(default)]
    pub custom_fields: CustomFieldMapping,
}

impl DesiredDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type: DeviceType::default(),
            custom_fields: CustomFieldMapping::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    #[must_use]
    pub fn with_custom_field(mut self, key: impl Into<String>, value: impl Into<d42_api::LooseValue>) -> Self {
        self.custom_fields.insert(key, value);
        self
    }

    /// Human-readable identity used in errors and logs.
    pub fn identity(&self) -> String {
        format!("device '{}'", self.name)
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        let resource = self.identity();
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation {
                resource,
                message: "name must not be empty".into(),
            });
        }
        self.custom_fields.check_representable(&resource)
    }
}

/// Device as last read from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDevice {
    pub id: RemoteId,
    pub name: String,
    /// Type as reported, kept raw so unknown server-side types still round-trip.
    pub device_type: Option<String>,
    pub custom_fields: CustomFieldMapping,
    pub in_service: Option<bool>,
    pub serial_no: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ObservedDevice {
    pub fn identity(&self) -> String {
        if self.name.is_empty() {
            format!("device #{}", self.id)
        } else {
            format!("device '{}'", self.name)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_type_parses_case_insensitively() {
        assert_eq!(DeviceType::parse("Physical").unwrap(), DeviceType::Physical);
        assert_eq!(DeviceType::parse(" blade ").unwrap(), DeviceType::Blade);
        assert_eq!(DeviceType::Cluster.as_ref(), "cluster");
    }

    #[test]
    fn unknown_device_type_lists_choices() {
        let err = DeviceType::parse("mainframe").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("mainframe"));
        assert!(text.contains("physical, virtual, blade, cluster, other"), "got: {text}");
    }

    #[test]
    fn default_type_is_virtual() {
        assert_eq!(DesiredDevice::new("db01").device_type, DeviceType::Virtual);
    }

    #[test]
    fn empty_name_fails_validation() {
        assert!(DesiredDevice::new(" ").validate().is_err());
        DesiredDevice::new("db01")
            .with_custom_field("env", "prod")
            .validate()
            .unwrap();
    }

    #[test]
    fn desired_device_deserializes_with_defaults() {
        let device: DesiredDevice =
            serde_json::from_str(r#"{"name": "db01", "custom_fields": {"env": "prod"}}"#).unwrap();
        assert_eq!(device.device_type, DeviceType::Virtual);
        assert_eq!(device.custom_fields.len(), 1);
    }
}
