//! Silence matching.
//!
//! A silence suppresses every alert whose labels satisfy all of its matchers.
//! Only silences in the [`SilenceState::Active`] state take part; matching
//! never fails, an invalid regex simply does not match.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TimelineError};
use crate::types::{AlertOccurrence, Labels};

/// The lifecycle state of a silence, as reported by the alerting backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    /// The silence is in effect.
    #[default]
    Active,
    /// The silence starts in the future.
    Pending,
    /// The silence has ended.
    Expired,
}

impl SilenceState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SilenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status block of a silence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceStatus {
    /// The lifecycle state.
    pub state: SilenceState,
}

const fn default_true() -> bool {
    true
}

/// One label condition of a silence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    /// The label name to inspect.
    pub name: String,
    /// The literal value or regular expression to compare against.
    pub value: String,
    /// Whether `value` is a regular expression.
    #[serde(default)]
    pub is_regex: bool,
    /// `true` requires a match, `false` requires the absence of one.
    #[serde(default = "default_true")]
    pub is_equal: bool,
}

impl Matcher {
    /// Creates an `name = value` matcher.
    #[must_use]
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: false,
            is_equal: true,
        }
    }

    /// Creates a `name =~ pattern` matcher.
    #[must_use]
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: pattern.into(),
            is_regex: true,
            is_equal: true,
        }
    }

    /// Negates the matcher (`!=` or `!~`).
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.is_equal = !self.is_equal;
        self
    }

    /// Returns true if `labels` satisfy this matcher.
    ///
    /// A missing label never matches, whatever the negation.
    #[must_use]
    pub fn matches(&self, labels: &Labels) -> bool {
        self.compile().matches(labels)
    }

    fn compile(&self) -> CompiledMatcher<'_> {
        let test = if self.is_regex {
            match Regex::new(&self.value) {
                Ok(re) => ValueTest::Regex(re),
                Err(e) => {
                    warn!(
                        matcher = %self.name,
                        pattern = %self.value,
                        error = %e,
                        "invalid silence regex, matcher will never match"
                    );
                    ValueTest::Invalid
                }
            }
        } else {
            ValueTest::Equal(&self.value)
        };
        CompiledMatcher {
            name: &self.name,
            test,
            is_equal: self.is_equal,
        }
    }
}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match (self.is_regex, self.is_equal) {
            (false, true) => "=",
            (false, false) => "!=",
            (true, true) => "=~",
            (true, false) => "!~",
        };
        write!(f, "{}{}\"{}\"", self.name, op, self.value)
    }
}

/// A silence that suppresses alerts matching all of its matchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    /// Unique identifier assigned by the backend.
    pub id: String,
    /// Label matchers, all of which must match.
    pub matchers: Vec<Matcher>,
    /// When the silence starts.
    pub starts_at: DateTime<Utc>,
    /// When the silence ends.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// Who created the silence.
    #[serde(default)]
    pub created_by: String,
    /// Comment explaining the silence.
    #[serde(default)]
    pub comment: String,
    /// Backend-reported status.
    #[serde(default)]
    pub status: SilenceStatus,
}

impl Silence {
    /// Creates an active silence.
    ///
    /// # Errors
    ///
    /// Returns `TimelineError::InvalidSilence` if `ends_at` is not after `starts_at`.
    pub fn new(
        id: impl Into<String>,
        matchers: Vec<Matcher>,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if ends_at.is_some_and(|end| end <= starts_at) {
            return Err(TimelineError::InvalidSilence {
                reason: "silence end time must be after start time".to_string(),
            });
        }

        Ok(Self {
            id: id.into(),
            matchers,
            starts_at,
            ends_at,
            created_by: String::new(),
            comment: String::new(),
            status: SilenceStatus::default(),
        })
    }

    /// Sets the backend-reported state.
    #[must_use]
    pub const fn with_state(mut self, state: SilenceState) -> Self {
        self.status.state = state;
        self
    }

    /// Returns true if the backend reports the silence as active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.state == SilenceState::Active
    }
}

/// Returns true if `labels` are suppressed by `silence`.
///
/// Non-active silences never match. Every matcher must match.
#[must_use]
pub fn matches(labels: &Labels, silence: &Silence) -> bool {
    silence.is_active() && silence.matchers.iter().all(|m| m.matches(labels))
}

/// Returns true if any active silence suppresses `occurrence`.
#[must_use]
pub fn is_silenced(occurrence: &AlertOccurrence, silences: &[Silence]) -> bool {
    silences.iter().any(|s| matches(&occurrence.labels, s))
}

/// Returns the occurrences not suppressed by any active silence.
#[must_use]
pub fn filter_active(occurrences: Vec<AlertOccurrence>, silences: &[Silence]) -> Vec<AlertOccurrence> {
    SilenceFilter::new(silences).filter_active(occurrences)
}

enum ValueTest<'a> {
    Equal(&'a str),
    Regex(Regex),
    Invalid,
}

struct CompiledMatcher<'a> {
    name: &'a str,
    test: ValueTest<'a>,
    is_equal: bool,
}

impl CompiledMatcher<'_> {
    fn matches(&self, labels: &Labels) -> bool {
        let Some(value) = labels.get(self.name) else {
            return false;
        };
        match &self.test {
            ValueTest::Equal(expected) => (value == expected) == self.is_equal,
            ValueTest::Regex(re) => re.is_match(value) == self.is_equal,
            ValueTest::Invalid => false,
        }
    }
}

struct CompiledSilence<'a> {
    id: &'a str,
    matchers: Vec<CompiledMatcher<'a>>,
}

/// Active silences with their regexes compiled once for a snapshot.
pub struct SilenceFilter<'a> {
    silences: Vec<CompiledSilence<'a>>,
}

impl<'a> SilenceFilter<'a> {
    /// Compiles the active silences among `silences`.
    #[must_use]
    pub fn new(silences: &'a [Silence]) -> Self {
        let compiled: Vec<CompiledSilence<'a>> = silences
            .iter()
            .filter(|s| s.is_active())
            .map(|s| CompiledSilence {
                id: &s.id,
                matchers: s.matchers.iter().map(Matcher::compile).collect(),
            })
            .collect();

        debug!(
            total = silences.len(),
            active = compiled.len(),
            "compiled silence filter"
        );

        Self { silences: compiled }
    }

    /// Returns the number of active silences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.silences.len()
    }

    /// Returns true if no silence is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.silences.is_empty()
    }

    /// Returns the id of the first active silence suppressing `labels`.
    #[must_use]
    pub fn silenced_by(&self, labels: &Labels) -> Option<&'a str> {
        self.silences
            .iter()
            .find(|s| s.matchers.iter().all(|m| m.matches(labels)))
            .map(|s| s.id)
    }

    /// Returns true if any active silence suppresses `occurrence`.
    #[must_use]
    pub fn is_silenced(&self, occurrence: &AlertOccurrence) -> bool {
        self.silenced_by(&occurrence.labels).is_some()
    }

    /// Returns the occurrences not suppressed by any active silence.
    #[must_use]
    pub fn filter_active(&self, occurrences: Vec<AlertOccurrence>) -> Vec<AlertOccurrence> {
        occurrences
            .into_iter()
            .filter(|o| !self.is_silenced(o))
            .collect()
    }
}

impl std::fmt::Debug for SilenceFilter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilenceFilter")
            .field(
                "silences",
                &self.silences.iter().map(|s| s.id).collect::<Vec<_>>(),
            )
            .finish()
    }
}
