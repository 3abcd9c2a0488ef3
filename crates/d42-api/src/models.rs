// Device42 API response types
//
// The write endpoints answer with a `{code, msg}` envelope; the read
// endpoints return bare records. Records use `#[serde(default)]` liberally
// and park free-form fields in `LooseValue` because the server does not keep
// a consistent shape per field across resource states.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Server-assigned numeric identifier of a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(u64);

impl RemoteId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RemoteId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ── Loosely-typed values ─────────────────────────────────────────────

/// A scalar JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A field whose shape the server does not guarantee: absent/null, a
/// scalar, or an arbitrary nested structure kept opaque.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum LooseValue {
    #[default]
    Null,
    Scalar(Scalar),
    Opaque(serde_json::Value),
}

impl LooseValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(s.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a non-negative integer.
    ///
    /// Accepts JSON integers, integral floats (`12.0`) and numeric strings.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Scalar(Scalar::Number(n)) => n.as_u64().or_else(|| {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= 0.0 {
                    format!("{f:.0}").parse().ok()
                } else {
                    None
                }
            }),
            Self::Scalar(Scalar::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Render the value the way it travels in a form field.
    ///
    /// Null renders as the empty string; opaque structures as compact JSON.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Scalar(s) => s.to_string(),
            Self::Opaque(v) => v.to_string(),
        }
    }
}

impl From<serde_json::Value> for LooseValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => Self::Scalar(Scalar::Number(n)),
            serde_json::Value::String(s) => Self::Scalar(Scalar::Text(s)),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Opaque(other)
            }
        }
    }
}

impl From<LooseValue> for serde_json::Value {
    fn from(v: LooseValue) -> Self {
        match v {
            LooseValue::Null => Self::Null,
            LooseValue::Scalar(Scalar::Bool(b)) => Self::Bool(b),
            LooseValue::Scalar(Scalar::Number(n)) => Self::Number(n),
            LooseValue::Scalar(Scalar::Text(s)) => Self::String(s),
            LooseValue::Opaque(v) => v,
        }
    }
}

impl From<&str> for LooseValue {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for LooseValue {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ── Response Envelope ────────────────────────────────────────────────

/// Envelope returned by every write endpoint.
///
/// ```json
/// { "code": 0, "msg": ["device added or updated", 42, "db01", true, false] }
/// ```
///
/// `code == 0` means success. On create, message index 1 carries the
/// newly assigned id.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub msg: Vec<LooseValue>,
}

impl ApiResponse {
    /// Position of the assigned id in a create response's message array.
    pub const ASSIGNED_ID_INDEX: usize = 1;

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// The id assigned by a create call.
    pub fn assigned_id(&self) -> Option<RemoteId> {
        self.msg
            .get(Self::ASSIGNED_ID_INDEX)
            .and_then(LooseValue::as_u64)
            .map(RemoteId)
    }

    /// Human-readable rendering of the message array.
    pub fn message(&self) -> String {
        let parts: Vec<String> = self
            .msg
            .iter()
            .filter(|v| !v.is_null())
            .map(LooseValue::render)
            .collect();
        if parts.is_empty() {
            format!("code={}", self.code)
        } else {
            parts.join(", ")
        }
    }
}

// ── Custom fields ────────────────────────────────────────────────────

/// One entry of a record's `custom_fields` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldRecord {
    pub key: String,
    #[serde(default)]
    pub value: LooseValue,
    #[serde(default)]
    pub notes: LooseValue,
}

impl CustomFieldRecord {
    pub fn new(key: impl Into<String>, value: impl Into<LooseValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            notes: LooseValue::Null,
        }
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// Full device object from `1.0/devices/id/{id}/`.
///
/// The endpoint returns dozens of fields, most of them nullable or
/// polymorphic. We model the ones reconciliation needs; everything else
/// lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: u64,
    #[serde(default)]
    pub device_id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_fields: Vec<CustomFieldRecord>,
    #[serde(default)]
    pub in_service: Option<bool>,
    #[serde(default)]
    pub serial_no: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub service_level: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub hw_model: LooseValue,
    #[serde(default)]
    pub os: LooseValue,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<LooseValue>,
    #[serde(default, deserialize_with = "nullable")]
    pub ip_addresses: Vec<LooseValue>,
    /// Catch-all for fields not modelled above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, LooseValue>,
}

// ── Password ─────────────────────────────────────────────────────────

/// Credential record from `1.0/passwords/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    /// Plain text only when requested with `plain_text=yes`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: LooseValue,
    #[serde(default)]
    pub device: LooseValue,
    #[serde(default)]
    pub appcomp: LooseValue,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub last_pw_change: Option<String>,
    #[serde(default)]
    pub first_added: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_fields: Vec<CustomFieldRecord>,
    /// Catch-all for fields not modelled above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, LooseValue>,
}

/// Body of the password lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordList {
    #[serde(default, deserialize_with = "nullable")]
    pub passwords: Vec<PasswordRecord>,
}
