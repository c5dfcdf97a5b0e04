//! Alerting rule catalog.
//!
//! The catalog is the allow-list of alerts tracked as health checks, plus the
//! severity and message template each one declares.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TimelineConfig;
use crate::types::{AlertMeta, Labels};

/// The kind of a Prometheus rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// A rule that produces alerts.
    #[default]
    Alerting,
    /// A rule that produces a new series.
    Recording,
}

/// A single rule as reported by the rules API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// The rule (and alert) name.
    pub name: String,
    /// Whether this is an alerting or recording rule.
    #[serde(rename = "type", default)]
    pub kind: RuleKind,
    /// The `PromQL` expression.
    #[serde(default)]
    pub query: String,
    /// Static labels added to every alert of this rule.
    #[serde(default)]
    pub labels: Labels,
    /// Annotations carrying templates such as the message.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// A named group of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    /// The group name.
    pub name: String,
    /// The rule file the group was loaded from.
    #[serde(default)]
    pub file: String,
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// What the catalog knows about one tracked alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Severity declared by the rule (empty if none).
    pub severity: String,
    /// Message template declared by the rule.
    pub template: Option<String>,
}

/// Allow-list of tracked alerts with their declared metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCatalog {
    entries: HashMap<String, CatalogEntry>,
    message_annotations: Vec<String>,
}

impl RuleCatalog {
    /// Builds the catalog from rule groups.
    ///
    /// Recording rules and rules lacking any of the configured health check
    /// labels are left out. The first declaration of a name wins.
    #[must_use]
    pub fn from_groups(groups: &[RuleGroup], config: &TimelineConfig) -> Self {
        let mut entries = HashMap::new();

        for group in groups {
            for rule in &group.rules {
                if rule.kind != RuleKind::Alerting || !is_health_check(rule, config) {
                    continue;
                }
                if entries.contains_key(&rule.name) {
                    debug!(group = %group.name, rule = %rule.name, "ignoring duplicate rule");
                    continue;
                }
                let template =
                    first_annotation(&rule.annotations, &config.message_annotations).cloned();
                let severity = rule.labels.get("severity").cloned().unwrap_or_default();
                entries.insert(rule.name.clone(), CatalogEntry { severity, template });
            }
        }

        debug!(tracked = entries.len(), groups = groups.len(), "built rule catalog");

        Self {
            entries,
            message_annotations: config.message_annotations.clone(),
        }
    }

    /// Returns true if alerts named `alert_name` are tracked.
    #[must_use]
    pub fn contains(&self, alert_name: &str) -> bool {
        self.entries.contains_key(alert_name)
    }

    /// Returns the entry for a tracked alert.
    #[must_use]
    pub fn get(&self, alert_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(alert_name)
    }

    /// Returns the number of tracked alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no alert is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds occurrence metadata for a tracked alert instance.
    ///
    /// The instance's own `severity` label takes precedence over the rule's,
    /// and `annotations` (from the live feed) take precedence over the rule's
    /// template. Returns `None` for untracked alerts.
    #[must_use]
    pub fn meta(
        &self,
        alert_name: &str,
        labels: &Labels,
        annotations: &HashMap<String, String>,
    ) -> Option<AlertMeta> {
        let entry = self.entries.get(alert_name)?;
        let severity = labels
            .get("severity")
            .cloned()
            .unwrap_or_else(|| entry.severity.clone());
        let template = first_annotation(annotations, &self.message_annotations)
            .or(entry.template.as_ref())
            .map(String::as_str);
        Some(AlertMeta::new(alert_name, labels.clone(), severity, template))
    }
}

fn is_health_check(rule: &Rule, config: &TimelineConfig) -> bool {
    config
        .health_check_labels
        .iter()
        .all(|(k, v)| rule.labels.get(k) == Some(v))
}

fn first_annotation<'a>(
    annotations: &'a HashMap<String, String>,
    keys: &[String],
) -> Option<&'a String> {
    keys.iter().find_map(|k| annotations.get(k))
}
