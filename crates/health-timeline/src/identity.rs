//! Stable identity keys for alert instances.

use crate::config::DEFAULT_STATE_LABEL;
use crate::types::Labels;

/// Separates the alert name from the label part. Prometheus alert and label
/// names are restricted to `[a-zA-Z0-9_:]`, so this never occurs inside them.
pub const NAME_SEPARATOR: char = '|';

/// Separates `key=value` pairs within the label part.
pub const LABEL_SEPARATOR: char = ',';

/// Builds the identity of an alert instance, ignoring the `alertstate` label.
#[must_use]
pub fn build_identity(alert_name: &str, labels: &Labels) -> String {
    build_identity_excluding(alert_name, labels, DEFAULT_STATE_LABEL)
}

/// Builds the identity of an alert instance, ignoring `state_label`.
///
/// Labels are serialized sorted by key so insertion order never matters.
#[must_use]
pub fn build_identity_excluding(alert_name: &str, labels: &Labels, state_label: &str) -> String {
    let mut sorted: Vec<_> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != state_label)
        .collect();
    sorted.sort_by_key(|(k, _)| *k);

    let mut identity = String::with_capacity(alert_name.len() + 16 * sorted.len());
    identity.push_str(alert_name);
    identity.push(NAME_SEPARATOR);
    for (i, (k, v)) in sorted.into_iter().enumerate() {
        if i > 0 {
            identity.push(LABEL_SEPARATOR);
        }
        identity.push_str(k);
        identity.push('=');
        identity.push_str(v);
    }
    identity
}
