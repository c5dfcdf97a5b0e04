//! Core types for timeline reconstruction.
//!
//! This module provides the fundamental types used throughout the crate:
//! - [`RawSample`]: One point of a sampled boolean alert series
//! - [`OccurrenceState`]: Whether an occurrence is still firing
//! - [`OccurrenceSource`]: Where an occurrence was derived from
//! - [`AlertMeta`]: Per-alert descriptive data attached to occurrences
//! - [`AlertOccurrence`]: One continuous firing interval of an alert instance

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::template::render_message;

/// A label set keyed by label name.
pub type Labels = HashMap<String, String>;

/// One point of a sampled boolean alert series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Whether the alert was firing at that instant.
    pub firing: bool,
}

impl RawSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, firing: bool) -> Self {
        Self { timestamp, firing }
    }

    /// Creates a sample from a unix timestamp in seconds.
    ///
    /// Returns `None` if the timestamp is not finite or out of range.
    #[must_use]
    pub fn from_unix_secs(secs: f64, firing: bool) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        let millis = (secs * 1000.0).round() as i64;
        DateTime::from_timestamp_millis(millis).map(|timestamp| Self { timestamp, firing })
    }
}

/// The state of an alert occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceState {
    /// The alert is still firing.
    Firing,
    /// The alert fired and has since cleared.
    Resolved,
}

impl OccurrenceState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for OccurrenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an occurrence was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceSource {
    /// Reconstructed from a range-query series.
    Historical,
    /// Reported by the live alert feed.
    Live,
}

/// Descriptive data attached to every occurrence of one alert instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMeta {
    /// The alert name.
    pub alert_name: String,
    /// The full label set of the alert instance.
    pub labels: Labels,
    /// The severity of the alert.
    pub severity: String,
    /// The rendered human-readable message.
    pub message: String,
}

impl AlertMeta {
    /// Creates metadata, rendering `template` against `labels`.
    #[must_use]
    pub fn new(
        alert_name: impl Into<String>,
        labels: Labels,
        severity: impl Into<String>,
        template: Option<&str>,
    ) -> Self {
        let message = template.map_or_else(String::new, |t| render_message(t, &labels));
        Self {
            alert_name: alert_name.into(),
            labels,
            severity: severity.into(),
            message,
        }
    }
}

/// One continuous interval during which an alert instance was firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertOccurrence {
    /// Unique identifier: the identity suffixed with the start time.
    pub uid: String,
    /// The alert name.
    pub alert_name: String,
    /// The full label set, including severity.
    pub labels: Labels,
    /// The severity of the alert.
    pub severity: String,
    /// The rendered human-readable message.
    pub message: String,
    /// When the alert started firing.
    pub start_time: DateTime<Utc>,
    /// When the alert cleared (None if still firing).
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between start and end (or now, while firing).
    pub duration_secs: u64,
    /// Whether the occurrence is firing or resolved.
    pub state: OccurrenceState,
    /// The identity of the alert instance.
    pub identity: String,
    /// Where this occurrence came from.
    pub source: OccurrenceSource,
}

impl AlertOccurrence {
    /// Creates a resolved occurrence reconstructed from history.
    ///
    /// An `end` earlier than `start` is clamped to `start`.
    #[must_use]
    pub fn resolved(
        identity: &str,
        meta: &AlertMeta,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let end = end.max(start);
        Self::build(
            identity,
            meta,
            start,
            Some(end),
            end - start,
            OccurrenceState::Resolved,
            OccurrenceSource::Historical,
        )
    }

    /// Creates an open occurrence from the live feed.
    #[must_use]
    pub fn live(identity: &str, meta: &AlertMeta, start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::build(
            identity,
            meta,
            start,
            None,
            now - start,
            OccurrenceState::Firing,
            OccurrenceSource::Live,
        )
    }

    fn build(
        identity: &str,
        meta: &AlertMeta,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        elapsed: Duration,
        state: OccurrenceState,
        source: OccurrenceSource,
    ) -> Self {
        Self {
            uid: occurrence_uid(identity, start),
            alert_name: meta.alert_name.clone(),
            labels: meta.labels.clone(),
            severity: meta.severity.clone(),
            message: meta.message.clone(),
            start_time: start,
            end_time: end,
            duration_secs: u64::try_from(elapsed.num_seconds()).unwrap_or(0),
            state,
            identity: identity.to_string(),
            source,
        }
    }

    /// Returns true if the occurrence is still firing.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Builds the addressable uid of one occurrence of an identity.
#[must_use]
pub fn occurrence_uid(identity: &str, start: DateTime<Utc>) -> String {
    format!("{identity}@{}", start.timestamp_millis())
}
