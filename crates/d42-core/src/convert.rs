// ── Wire-to-domain conversion ──
//
// Bridges the API crate's lenient records into observed domain state.
// Nothing here fails: fields the server omits or shapes unexpectedly
// become `None` rather than aborting the read.

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;

use d42_api::{DeviceRecord, LooseValue, PasswordRecord, RemoteId};

use crate::model::custom_fields::flatten;
use crate::model::{ObservedDevice, ObservedPassword};

impl From<DeviceRecord> for ObservedDevice {
    fn from(r: DeviceRecord) -> Self {
        Self {
            id: RemoteId::new(r.device_id.unwrap_or(r.id)),
            name: r.name.unwrap_or_default(),
            device_type: non_empty(r.device_type),
            custom_fields: flatten(r.custom_fields),
            in_service: r.in_service,
            serial_no: non_empty(r.serial_no),
            last_updated: r.last_updated.as_deref().and_then(parse_timestamp),
        }
    }
}

impl From<PasswordRecord> for ObservedPassword {
    fn from(r: PasswordRecord) -> Self {
        Self {
            id: RemoteId::new(r.id),
            username: r.username.unwrap_or_default(),
            password: r.password.map(SecretString::from),
            label: non_empty(r.label),
            category: loose_text(&r.category),
            notes: non_empty(r.notes),
            device: loose_text(&r.device),
            appcomp: loose_text(&r.appcomp),
            custom_fields: flatten(r.custom_fields),
            last_pw_change: r.last_pw_change.as_deref().and_then(parse_timestamp),
            first_added: r.first_added.as_deref().and_then(parse_timestamp),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Reduce a loosely-shaped reference field to comparable text.
///
/// Some appliance versions report a related object as `{"name": ...}` or a
/// list of names instead of a bare string.
fn loose_text(value: &LooseValue) -> Option<String> {
    let text = match value {
        LooseValue::Null => return None,
        LooseValue::Scalar(s) => s.to_string(),
        LooseValue::Opaque(serde_json::Value::Object(map)) => match map.get("name") {
            Some(name) => LooseValue::from(name.clone()).render(),
            None => value.render(),
        },
        LooseValue::Opaque(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| LooseValue::from(item.clone()).render())
            .collect::<Vec<_>>()
            .join(","),
        LooseValue::Opaque(other) => other.to_string(),
    };
    Some(text).filter(|t| !t.is_empty())
}

/// Accept RFC 3339 as well as the naive `T`- and space-separated forms the
/// appliance emits, interpreting naive times as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
