//! Timeline construction for one snapshot of upstream data.
//!
//! [`build_timeline`] is the entry point a polling loop calls on every
//! refresh. It is a pure function of its inputs: the same snapshot, config
//! and `now` always yield the same [`Timeline`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TimelineConfig;
use crate::identity::build_identity_excluding;
use crate::live::{adapt, LiveAlert};
use crate::merge::merge;
use crate::reconstruct::reconstruct;
use crate::rules::{RuleCatalog, RuleGroup};
use crate::silence::{Silence, SilenceFilter};
use crate::source::SeriesSnapshot;
use crate::types::AlertOccurrence;

/// Value of the state label on series that only track pending alerts.
const PENDING_STATE: &str = "pending";

/// Everything fetched from upstream for one refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Range query series of the alert metric over the lookback window.
    #[serde(default)]
    pub series: Vec<SeriesSnapshot>,
    /// Alerts currently reported by the live feed.
    #[serde(default)]
    pub live_alerts: Vec<LiveAlert>,
    /// Alerting rule groups.
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
    /// All known silences.
    #[serde(default)]
    pub silences: Vec<Silence>,
}

/// The reconstructed timeline with silence status per occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// Occurrences ordered newest first.
    pub occurrences: Vec<AlertOccurrence>,
    /// Occurrence uid to the id of the silence suppressing it.
    pub silenced: HashMap<String, String>,
}

impl Timeline {
    /// Returns true if the occurrence with `uid` is silenced.
    #[must_use]
    pub fn is_silenced(&self, uid: &str) -> bool {
        self.silenced.contains_key(uid)
    }

    /// Returns the id of the silence suppressing the occurrence with `uid`.
    #[must_use]
    pub fn silenced_by(&self, uid: &str) -> Option<&str> {
        self.silenced.get(uid).map(String::as_str)
    }

    /// Returns the occurrences no active silence suppresses.
    #[must_use]
    pub fn unsilenced(&self) -> Vec<&AlertOccurrence> {
        self.occurrences
            .iter()
            .filter(|o| !self.is_silenced(&o.uid))
            .collect()
    }

    /// Returns the occurrences still firing.
    pub fn firing(&self) -> impl Iterator<Item = &AlertOccurrence> {
        self.occurrences.iter().filter(|o| o.is_open())
    }

    /// Returns the number of occurrences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    /// Returns true if there are no occurrences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Builds the timeline for one snapshot.
///
/// Series and live alerts of alerts the rule catalog does not track are
/// ignored, as are series recording the pending sub-state.
#[must_use]
pub fn build_timeline(
    snapshot: &HealthSnapshot,
    config: &TimelineConfig,
    now: DateTime<Utc>,
) -> Timeline {
    let catalog = RuleCatalog::from_groups(&snapshot.rule_groups, config);
    let live = adapt(&snapshot.live_alerts, &catalog, &config.state_label, now);
    let live_identities: HashSet<&str> = live.iter().map(|o| o.identity.as_str()).collect();

    let no_annotations = HashMap::new();
    let mut historical = Vec::new();
    for series in &snapshot.series {
        let Some(name) = series.alert_name() else {
            debug!(labels = ?series.labels, "series without alertname");
            continue;
        };
        if series.labels.get(&config.state_label).map(String::as_str) == Some(PENDING_STATE) {
            continue;
        }
        let Some(meta) = catalog.meta(name, &series.labels, &no_annotations) else {
            continue;
        };
        let identity = build_identity_excluding(name, &series.labels, &config.state_label);
        let is_live = live_identities.contains(identity.as_str());
        historical.extend(reconstruct(
            &series.samples,
            &identity,
            &meta,
            is_live,
            config.default_step(),
        ));
    }

    let occurrences = merge(historical, live, now);

    let filter = SilenceFilter::new(&snapshot.silences);
    let silenced: HashMap<String, String> = occurrences
        .iter()
        .filter_map(|o| {
            filter
                .silenced_by(&o.labels)
                .map(|id| (o.uid.clone(), id.to_string()))
        })
        .collect();

    info!(
        tracked_alerts = catalog.len(),
        series = snapshot.series.len(),
        occurrences = occurrences.len(),
        firing = occurrences.iter().filter(|o| o.is_open()).count(),
        silenced = silenced.len(),
        "built alert timeline"
    );

    Timeline {
        occurrences,
        silenced,
    }
}
