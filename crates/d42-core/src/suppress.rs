// ── Custom-field diff suppression ──
//
// Drift is reported only for keys the user declared. Keys that exist on the
// server but were never declared (added by other tooling, or by hand) are
// left alone, and so are the bookkeeping keys orchestration layers attach
// to maps, such as a `custom_fields.%` element count.

use crate::model::CustomFieldChange;
use crate::model::CustomFieldMapping;

/// Path prefix under which custom-field keys are addressed.
pub const CUSTOM_FIELDS_PREFIX: &str = "custom_fields.";

/// Whether a difference at `field_key` counts as drift.
///
/// `field_key` may be a bare key (`env`) or a prefixed path
/// (`custom_fields.env`). Returns true exactly when the stripped key is
/// declared in `desired`.
pub fn is_drift(field_key: &str, desired: &CustomFieldMapping) -> bool {
    let key = field_key
        .strip_prefix(CUSTOM_FIELDS_PREFIX)
        .unwrap_or(field_key);
    desired.contains_key(key)
}

/// Inverse of [`is_drift`], for hooks that ask whether to hide a diff.
pub fn suppress_diff(field_key: &str, desired: &CustomFieldMapping) -> bool {
    !is_drift(field_key, desired)
}

/// Custom-field changes that survive suppression, in key order.
pub fn drift(desired: &CustomFieldMapping, observed: &CustomFieldMapping) -> Vec<CustomFieldChange> {
    desired
        .changes_from(observed)
        .into_iter()
        .filter(|change| is_drift(&change.key, desired))
        .collect()
}
