//! Adapter for the live "currently firing" alert feed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identity::build_identity_excluding;
use crate::rules::RuleCatalog;
use crate::types::{AlertOccurrence, Labels};

/// An alert as reported by the live alerts API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAlert {
    /// The alert labels, including `alertname`.
    #[serde(default)]
    pub labels: Labels,
    /// Rendered annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// The alert sub-state (`pending` or `firing`).
    #[serde(default)]
    pub state: Option<String>,
    /// When the alert became active.
    #[serde(default)]
    pub active_at: Option<DateTime<Utc>>,
    /// The sample value that triggered the alert.
    #[serde(default)]
    pub value: Option<String>,
}

impl LiveAlert {
    /// Returns true if the alert is still pending its `for` duration.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.as_deref() == Some("pending")
    }

    /// Returns the `alertname` label.
    #[must_use]
    pub fn alert_name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

/// Converts live alerts into open occurrences.
///
/// Pending alerts, alerts not tracked by `catalog` and alerts lacking an
/// `alertname` label are left out. A missing activation time falls back to
/// `now`.
#[must_use]
pub fn adapt(
    live_alerts: &[LiveAlert],
    catalog: &RuleCatalog,
    state_label: &str,
    now: DateTime<Utc>,
) -> Vec<AlertOccurrence> {
    let occurrences: Vec<AlertOccurrence> = live_alerts
        .iter()
        .filter(|alert| !alert.is_pending())
        .filter_map(|alert| {
            let Some(name) = alert.alert_name() else {
                debug!(labels = ?alert.labels, "live alert without alertname");
                return None;
            };
            let meta = catalog.meta(name, &alert.labels, &alert.annotations)?;
            let identity = build_identity_excluding(name, &alert.labels, state_label);
            let start = alert.active_at.unwrap_or(now);
            Some(AlertOccurrence::live(&identity, &meta, start, now))
        })
        .collect();

    debug!(
        received = live_alerts.len(),
        tracked = occurrences.len(),
        "adapted live alerts"
    );

    occurrences
}
