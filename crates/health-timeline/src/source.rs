//! Decoding of upstream API payloads into engine inputs.
//!
//! Four collaborators feed the engine:
//! - Prometheus `/api/v1/query_range` matrix results ([`decode_range_query`])
//! - Prometheus `/api/v1/alerts` ([`decode_alerts`])
//! - Prometheus `/api/v1/rules` ([`decode_rules`])
//! - Alertmanager `/api/v2/silences` ([`decode_silences`])
//!
//! Envelope-level problems are errors. Individual bad points or entries are
//! skipped so one malformed record never hides the rest of a snapshot.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TimelineError};
use crate::live::LiveAlert;
use crate::rules::{Rule, RuleGroup};
use crate::silence::Silence;
use crate::types::{Labels, RawSample};

/// Label holding the metric name, which is not part of an alert's label set.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// One labelled series of a range query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    /// The series labels, including `alertname` for `ALERTS` series.
    pub labels: Labels,
    /// Samples in ascending timestamp order.
    pub samples: Vec<RawSample>,
}

impl SeriesSnapshot {
    /// Returns the `alertname` label.
    #[must_use]
    pub fn alert_name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if self.status != "success" {
            let reason = match (self.error_type, self.error) {
                (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
                (Some(kind), None) => kind,
                (None, Some(msg)) => msg,
                (None, None) => String::new(),
            };
            return Err(TimelineError::UpstreamStatus {
                status: self.status,
                reason,
            });
        }
        self.data
            .ok_or_else(|| TimelineError::Decode("response has no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatrixData {
    result_type: String,
    #[serde(default)]
    result: Vec<MatrixSeries>,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    metric: Labels,
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AlertsData {
    #[serde(default)]
    alerts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RulesData {
    #[serde(default)]
    groups: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawRuleGroup {
    name: String,
    #[serde(default)]
    file: String,
    #[serde(default)]
    rules: Vec<Value>,
}

fn decode_envelope<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str::<Envelope<T>>(json)?.into_data()
}

/// Decodes each entry on its own, dropping the ones that fail.
fn decode_entries<T: DeserializeOwned>(entries: Vec<Value>, kind: &'static str) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(error = %e, kind, "skipping undecodable entry");
                None
            }
        })
        .collect()
}

/// Decodes a range query response into per-series samples.
///
/// The metric name label is dropped so series labels line up with the labels
/// the live feed reports for the same alert.
///
/// # Errors
///
/// Returns `TimelineError::Decode` for malformed JSON or a non-matrix result,
/// and `TimelineError::UpstreamStatus` when the query failed upstream.
pub fn decode_range_query(json: &str) -> Result<Vec<SeriesSnapshot>> {
    let data: MatrixData = decode_envelope(json)?;
    if data.result_type != "matrix" {
        return Err(TimelineError::Decode(format!(
            "expected matrix result, got {}",
            data.result_type
        )));
    }

    let series: Vec<SeriesSnapshot> = data
        .result
        .into_iter()
        .map(|mut s| {
            s.metric.remove(METRIC_NAME_LABEL);
            SeriesSnapshot {
                samples: parse_samples(&s.values),
                labels: s.metric,
            }
        })
        .collect();

    debug!(series = series.len(), "decoded range query");
    Ok(series)
}

/// Decodes the live alerts response.
///
/// Alerts that do not decode are skipped.
///
/// # Errors
///
/// Returns `TimelineError::Decode` for malformed JSON and
/// `TimelineError::UpstreamStatus` when the request failed upstream.
pub fn decode_alerts(json: &str) -> Result<Vec<LiveAlert>> {
    let data: AlertsData = decode_envelope(json)?;
    let total = data.alerts.len();
    let alerts: Vec<LiveAlert> = decode_entries(data.alerts, "alert");
    debug!(total, decoded = alerts.len(), "decoded live alerts");
    Ok(alerts)
}

/// Decodes the rules response.
///
/// Groups and rules that do not decode are skipped; the rest of a group is
/// kept when one of its rules is bad.
///
/// # Errors
///
/// Returns `TimelineError::Decode` for malformed JSON and
/// `TimelineError::UpstreamStatus` when the request failed upstream.
pub fn decode_rules(json: &str) -> Result<Vec<RuleGroup>> {
    let data: RulesData = decode_envelope(json)?;
    let groups: Vec<RuleGroup> = decode_entries::<RawRuleGroup>(data.groups, "rule group")
        .into_iter()
        .map(|group| RuleGroup {
            name: group.name,
            file: group.file,
            rules: decode_entries::<Rule>(group.rules, "rule"),
        })
        .collect();
    debug!(groups = groups.len(), "decoded rule groups");
    Ok(groups)
}

/// Decodes the silences response, a bare JSON array.
///
/// Entries that do not decode as silences are skipped.
///
/// # Errors
///
/// Returns `TimelineError::Decode` if the payload is not a JSON array.
pub fn decode_silences(json: &str) -> Result<Vec<Silence>> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    let total = entries.len();
    let silences: Vec<Silence> = decode_entries(entries, "silence");

    debug!(total, decoded = silences.len(), "decoded silences");
    Ok(silences)
}

/// Parses `[timestamp, "value"]` points into samples.
///
/// A value is firing when it is a non-zero number. Points that are not a
/// pair, carry a non-numeric timestamp or value, or do not advance the clock
/// are skipped.
#[must_use]
pub fn parse_samples(values: &[Value]) -> Vec<RawSample> {
    let mut samples: Vec<RawSample> = Vec::with_capacity(values.len());

    for point in values {
        let Some(sample) = parse_point(point) else {
            debug!(point = %point, "skipping malformed sample");
            continue;
        };
        if samples
            .last()
            .is_some_and(|prev| sample.timestamp <= prev.timestamp)
        {
            debug!(point = %point, "skipping out-of-order sample");
            continue;
        }
        samples.push(sample);
    }

    samples
}

fn parse_point(point: &Value) -> Option<RawSample> {
    let [ts, value] = point.as_array()?.as_slice() else {
        return None;
    };
    let secs = as_number(ts)?;
    let value = as_number(value)?;
    RawSample::from_unix_secs(secs, value != 0.0)
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;
    use crate::silence::SilenceState;
    use serde_json::json;

    mod sample_tests {
        use super::*;

        #[test]
        fn parses_prometheus_points() {
            let samples = parse_samples(&[json!([0, "0"]), json!([60, "1"]), json!([120.5, "1"])]);
            assert_eq!(samples.len(), 3);
            assert!(!samples[0].firing);
            assert!(samples[1].firing);
            assert_eq!(samples[2].timestamp.timestamp_millis(), 120_500);
        }

        #[test]
        fn non_zero_values_are_firing() {
            let samples = parse_samples(&[json!([0, "2"]), json!([60, "-1"]), json!([120, 1])]);
            assert!(samples.iter().all(|s| s.firing));
        }

        #[test]
        fn malformed_points_skipped() {
            let samples = parse_samples(&[
                json!([0, "1"]),
                json!([60, "abc"]),
                json!(["x", "1"]),
                json!([90]),
                json!({"t": 100}),
                json!([120, "NaN"]),
                json!([180, "0"]),
            ]);
            let times: Vec<_> = samples.iter().map(|s| s.timestamp.timestamp()).collect();
            assert_eq!(times, vec![0, 180]);
        }

        #[test]
        fn out_of_order_points_skipped() {
            let samples = parse_samples(&[json!([60, "1"]), json!([0, "0"]), json!([60, "0"]), json!([120, "0"])]);
            let times: Vec<_> = samples.iter().map(|s| s.timestamp.timestamp()).collect();
            assert_eq!(times, vec![60, 120]);
        }

        #[test]
        fn string_timestamps_accepted() {
            let samples = parse_samples(&[json!(["1700000000", "1"])]);
            assert_eq!(samples[0].timestamp.timestamp(), 1_700_000_000);
        }
    }

    #[test]
    fn decodes_range_query() {
        let body = json!({
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {
                        "metric": {"__name__": "ALERTS", "alertname": "NodeDown", "alertstate": "firing"},
                        "values": [[0, "0"], [60, "1"], [120, "1"]]
                    },
                    {"metric": {"alertname": "DiskFull"}, "values": []}
                ]
            }
        })
        .to_string();

        let series = decode_range_query(&body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].alert_name(), Some("NodeDown"));
        assert!(!series[0].labels.contains_key("__name__"));
        assert_eq!(series[0].samples.len(), 3);
        assert!(series[1].samples.is_empty());
    }

    #[test]
    fn range_query_rejects_vector_result() {
        let body = json!({"status": "success", "data": {"resultType": "vector", "result": []}}).to_string();
        assert!(matches!(decode_range_query(&body), Err(TimelineError::Decode(_))));
    }

    #[test]
    fn upstream_error_surfaces() {
        let body = json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "invalid parameter \"query\""
        })
        .to_string();
        match decode_range_query(&body) {
            Err(TimelineError::UpstreamStatus { status, reason }) => {
                assert_eq!(status, "error");
                assert_eq!(reason, "bad_data: invalid parameter \"query\"");
            }
            other => panic!("expected UpstreamStatus, got {other:?}"),
        }
    }

    #[test]
    fn success_without_data_is_decode_error() {
        let body = json!({"status": "success"}).to_string();
        assert!(matches!(decode_alerts(&body), Err(TimelineError::Decode(_))));
    }

    #[test]
    fn decodes_alerts() {
        let body = json!({
            "status": "success",
            "data": {"alerts": [{
                "labels": {"alertname": "NodeDown", "node": "worker-1"},
                "annotations": {"message": "down"},
                "state": "firing",
                "activeAt": "2024-01-15T10:00:00Z",
                "value": "1e+00"
            }]}
        })
        .to_string();
        let alerts = decode_alerts(&body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_name(), Some("NodeDown"));
    }

    #[test]
    fn decodes_rules() {
        let body = json!({
            "status": "success",
            "data": {"groups": [{
                "name": "health",
                "file": "health.yaml",
                "rules": [{"name": "NodeDown", "type": "alerting", "query": "up == 0", "labels": {"severity": "critical"}}]
            }]}
        })
        .to_string();
        let groups = decode_rules(&body).unwrap();
        assert_eq!(groups[0].rules[0].kind, RuleKind::Alerting);
    }

    #[test]
    fn bad_alert_does_not_hide_the_rest() {
        let body = json!({
            "status": "success",
            "data": {"alerts": [
                {
                    "labels": {"alertname": "NodeDown", "node": "worker-1"},
                    "state": "firing",
                    "activeAt": "2024-01-15T10:00:00Z"
                },
                {
                    "labels": {"alertname": "NodeDown", "node": "worker-2"},
                    "state": "firing",
                    "activeAt": "not-a-time"
                },
                "garbage"
            ]}
        })
        .to_string();
        let alerts = decode_alerts(&body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].labels.get("node").map(String::as_str), Some("worker-1"));
    }

    #[test]
    fn bad_rule_does_not_hide_its_group() {
        let body = json!({
            "status": "success",
            "data": {"groups": [
                {
                    "name": "health",
                    "rules": [
                        {"name": "NodeDown", "type": "alerting"},
                        {"name": "Broken", "type": "unknown-kind"},
                        {"type": "alerting"}
                    ]
                },
                {"file": "nameless.yaml"}
            ]}
        })
        .to_string();
        let groups = decode_rules(&body).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "health");
        assert_eq!(groups[0].rules.len(), 1);
        assert_eq!(groups[0].rules[0].name, "NodeDown");
    }

    #[test]
    fn decodes_silences_skipping_bad_entries() {
        let body = json!([
            {
                "id": "a",
                "matchers": [{"name": "alertname", "value": "NodeDown", "isRegex": false, "isEqual": true}],
                "startsAt": "2024-01-15T10:00:00Z",
                "endsAt": "2024-01-15T14:00:00Z",
                "status": {"state": "active"}
            },
            {"id": "b"}
        ])
        .to_string();
        let silences = decode_silences(&body).unwrap();
        assert_eq!(silences.len(), 1);
        assert_eq!(silences[0].id, "a");
        assert_eq!(silences[0].status.state, SilenceState::Active);
    }

    #[test]
    fn silences_must_be_array() {
        assert!(decode_silences("{}").is_err());
    }
}
