// ── Custom-field normalization ──
//
// The server reports custom fields as a list of `{key, value, notes}`
// records and accepts bulk writes as a single `key:value,key:value` string.
// Everything in between works on a flat key -> value mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use d42_api::{CustomFieldRecord, LooseValue};

use crate::error::CoreError;

/// Separator between a key and its value in a bulk payload.
pub const KEY_VALUE_SEPARATOR: char = ':';
/// Separator between pairs in a bulk payload.
pub const PAIR_SEPARATOR: char = ',';

/// Flat custom-field mapping. Keys iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomFieldMapping(BTreeMap<String, LooseValue>);

/// One custom field whose remote value differs from the desired one.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomFieldChange {
    pub key: String,
    /// Last-read value; `None` when the key was never reported.
    pub old: Option<LooseValue>,
    pub new: LooseValue,
}

impl CustomFieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LooseValue>) -> Option<LooseValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&LooseValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LooseValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fail if any key or value cannot travel in a bulk payload or a
    /// single-field write without being misparsed by the server.
    pub fn check_representable(&self, resource: &str) -> Result<(), CoreError> {
        for (key, value) in self.iter() {
            check_pair(resource, key, value)?;
        }
        Ok(())
    }

    /// Keys whose desired value differs from the last-read mapping.
    ///
    /// Only keys present in `self` are considered. Keys that exist remotely
    /// but are not declared here are never reported.
    pub fn changes_from(&self, observed: &CustomFieldMapping) -> Vec<CustomFieldChange> {
        self.iter()
            .filter(|(key, value)| !same_value(value, observed.get(key)))
            .map(|(key, value)| CustomFieldChange {
                key: key.to_owned(),
                old: observed.get(key).cloned(),
                new: value.clone(),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<LooseValue>> FromIterator<(K, V)> for CustomFieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a CustomFieldMapping {
    type Item = (&'a String, &'a LooseValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, LooseValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Normalizer ───────────────────────────────────────────────────────

/// Collapse server-reported records into a mapping.
///
/// Notes are discarded. When a key repeats, the last record wins.
pub fn flatten<I>(records: I) -> CustomFieldMapping
where
    I: IntoIterator<Item = CustomFieldRecord>,
{
    records
        .into_iter()
        .map(|record| (record.key, record.value))
        .collect()
}

/// Serialize a mapping into the bulk wire format, pairs in key order.
///
/// Values are written in their form-field rendering; null becomes empty.
/// Callers must run [`CustomFieldMapping::check_representable`] first,
/// since separators inside keys or values are not escaped.
pub fn build_bulk_payload(mapping: &CustomFieldMapping) -> String {
    let mut payload = String::new();
    for (key, value) in mapping.iter() {
        if !payload.is_empty() {
            payload.push(PAIR_SEPARATOR);
        }
        payload.push_str(key);
        payload.push(KEY_VALUE_SEPARATOR);
        payload.push_str(&value.render());
    }
    payload
}

/// Split a bulk payload back into records.
///
/// Pairs without a separator are read as a key with an empty value, and the
/// value is everything after the first separator.
///
/// Every value comes back as text, so a mapping holding `8` or `null` parses
/// back to `"8"` and `""`. The two mappings agree only once rendered.
pub fn parse_bulk_payload(payload: &str) -> Vec<CustomFieldRecord> {
    payload
        .split(PAIR_SEPARATOR)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once(KEY_VALUE_SEPARATOR) {
            Some((key, value)) => CustomFieldRecord::new(key, value),
            None => CustomFieldRecord::new(pair, ""),
        })
        .collect()
}

/// Values compare by their rendered form, so `null` equals `""` and `3`
/// equals `"3"`.
pub(crate) fn same_value(desired: &LooseValue, observed: Option<&LooseValue>) -> bool {
    observed.is_some_and(|o| o.render() == desired.render())
}

fn check_pair(resource: &str, key: &str, value: &LooseValue) -> Result<(), CoreError> {
    let invalid = |message: String| CoreError::Validation {
        resource: resource.to_owned(),
        message,
    };
    if key.trim().is_empty() {
        return Err(invalid("custom field keys must not be empty".into()));
    }
    if key.contains([KEY_VALUE_SEPARATOR, PAIR_SEPARATOR]) {
        return Err(invalid(format!(
            "custom field key '{key}' contains '{KEY_VALUE_SEPARATOR}' or '{PAIR_SEPARATOR}'"
        )));
    }
    if value.render().contains([KEY_VALUE_SEPARATOR, PAIR_SEPARATOR]) {
        return Err(invalid(format!(
            "value of custom field '{key}' contains '{KEY_VALUE_SEPARATOR}' or '{PAIR_SEPARATOR}'"
        )));
    }
    Ok(())
}
