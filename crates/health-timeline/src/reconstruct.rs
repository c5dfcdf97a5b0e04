//! Reconstruction of firing intervals from sampled alert series.
//!
//! A range query yields one boolean sample per step. Consecutive firing
//! samples form a run; the first non-firing sample after a run closes it.
//! A run still open when the series ends is either left to the live feed or
//! assumed to have cleared one step after its last firing sample.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::types::{AlertMeta, AlertOccurrence, RawSample};

/// Scanner state while walking a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Not inside a firing run.
    Idle,
    /// Inside a firing run.
    InRun {
        /// Timestamp of the first firing sample of the run.
        start: DateTime<Utc>,
        /// Timestamp of the most recent firing sample of the run.
        last_firing: DateTime<Utc>,
    },
}

impl ScanState {
    /// Advances the scanner by one sample.
    ///
    /// Returns the next state and the `(start, end)` interval closed by this
    /// sample, if any.
    #[must_use]
    pub fn advance(self, sample: &RawSample) -> (Self, Option<(DateTime<Utc>, DateTime<Utc>)>) {
        match (self, sample.firing) {
            (Self::Idle, true) => (
                Self::InRun {
                    start: sample.timestamp,
                    last_firing: sample.timestamp,
                },
                None,
            ),
            (Self::Idle, false) => (Self::Idle, None),
            (Self::InRun { start, .. }, true) => (
                Self::InRun {
                    start,
                    last_firing: sample.timestamp,
                },
                None,
            ),
            (Self::InRun { start, .. }, false) => (Self::Idle, Some((start, sample.timestamp))),
        }
    }
}

/// Infers the sampling step from the first two samples.
///
/// Falls back to `default_step` when fewer than two samples exist or the
/// first two are not strictly increasing.
#[must_use]
pub fn infer_step(samples: &[RawSample], default_step: Duration) -> Duration {
    match samples {
        [first, second, ..] if second.timestamp > first.timestamp => {
            second.timestamp - first.timestamp
        }
        _ => default_step,
    }
}

/// Reconstructs the resolved firing intervals of one alert series.
///
/// `samples` are expected in ascending timestamp order; samples that do not
/// advance the clock are skipped. When `is_currently_live` is set, a run
/// still open at the end of the series is not emitted because the live feed
/// supplies it.
#[must_use]
pub fn reconstruct(
    samples: &[RawSample],
    identity: &str,
    meta: &AlertMeta,
    is_currently_live: bool,
    default_step: Duration,
) -> Vec<AlertOccurrence> {
    let step = infer_step(samples, default_step);
    let mut occurrences = Vec::new();
    let mut state = ScanState::Idle;
    let mut last_seen: Option<DateTime<Utc>> = None;

    for sample in samples {
        if last_seen.is_some_and(|prev| sample.timestamp <= prev) {
            debug!(
                identity = %identity,
                timestamp = %sample.timestamp,
                "skipping out-of-order sample"
            );
            continue;
        }
        last_seen = Some(sample.timestamp);

        let (next, closed) = state.advance(sample);
        if let Some((start, end)) = closed {
            occurrences.push(AlertOccurrence::resolved(identity, meta, start, end));
        }
        state = next;
    }

    if let ScanState::InRun { start, last_firing } = state {
        if is_currently_live {
            debug!(identity = %identity, start = %start, "open run deferred to live feed");
        } else {
            let end = last_firing.checked_add_signed(step).unwrap_or_else(|| {
                debug!(identity = %identity, "step overflows the time range");
                last_firing
            });
            occurrences.push(AlertOccurrence::resolved(identity, meta, start, end));
        }
    }

    debug!(
        identity = %identity,
        samples = samples.len(),
        step_secs = step.num_seconds(),
        occurrences = occurrences.len(),
        "reconstructed series"
    );

    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Labels, OccurrenceState};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn series(points: &[(i64, bool)]) -> Vec<RawSample> {
        points
            .iter()
            .map(|(secs, firing)| RawSample::new(ts(*secs), *firing))
            .collect()
    }

    fn meta() -> AlertMeta {
        let mut labels = Labels::new();
        labels.insert("alertname".to_string(), "NodeDown".to_string());
        labels.insert("node".to_string(), "worker-1".to_string());
        AlertMeta::new("NodeDown", labels, "warning", Some("{{ $labels.node }} down"))
    }

    fn step() -> Duration {
        Duration::seconds(60)
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn idle_to_in_run_on_firing() {
            let (next, closed) = ScanState::Idle.advance(&RawSample::new(ts(10), true));
            assert_eq!(
                next,
                ScanState::InRun {
                    start: ts(10),
                    last_firing: ts(10)
                }
            );
            assert!(closed.is_none());
        }

        #[test]
        fn idle_stays_idle_on_quiet() {
            let (next, closed) = ScanState::Idle.advance(&RawSample::new(ts(10), false));
            assert_eq!(next, ScanState::Idle);
            assert!(closed.is_none());
        }

        #[test]
        fn in_run_tracks_last_firing() {
            let state = ScanState::InRun {
                start: ts(10),
                last_firing: ts(10),
            };
            let (next, closed) = state.advance(&RawSample::new(ts(20), true));
            assert_eq!(
                next,
                ScanState::InRun {
                    start: ts(10),
                    last_firing: ts(20)
                }
            );
            assert!(closed.is_none());
        }

        #[test]
        fn in_run_closes_on_quiet() {
            let state = ScanState::InRun {
                start: ts(10),
                last_firing: ts(20),
            };
            let (next, closed) = state.advance(&RawSample::new(ts(30), false));
            assert_eq!(next, ScanState::Idle);
            assert_eq!(closed, Some((ts(10), ts(30))));
        }
    }

    mod step_tests {
        use super::*;

        #[test]
        fn step_from_first_two_samples() {
            let samples = series(&[(0, false), (30, false), (90, false)]);
            assert_eq!(infer_step(&samples, step()), Duration::seconds(30));
        }

        #[test]
        fn step_defaults_for_single_sample() {
            let samples = series(&[(0, true)]);
            assert_eq!(infer_step(&samples, step()), step());
        }

        #[test]
        fn step_defaults_for_empty_series() {
            assert_eq!(infer_step(&[], step()), step());
        }

        #[test]
        fn step_defaults_for_non_increasing_pair() {
            let samples = series(&[(60, true), (60, true)]);
            assert_eq!(infer_step(&samples, step()), step());
        }
    }

    #[test]
    fn empty_series_yields_nothing() {
        assert!(reconstruct(&[], "id", &meta(), false, step()).is_empty());
    }

    #[test]
    fn never_firing_yields_nothing() {
        let samples = series(&[(0, false), (60, false), (120, false)]);
        assert!(reconstruct(&samples, "id", &meta(), false, step()).is_empty());
    }

    #[test]
    fn run_closed_by_quiet_sample() {
        let samples = series(&[(0, false), (60, true), (120, true), (180, false)]);
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start_time, ts(60));
        assert_eq!(occs[0].end_time, Some(ts(180)));
        assert_eq!(occs[0].duration_secs, 120);
        assert_eq!(occs[0].state, OccurrenceState::Resolved);
        assert_eq!(occs[0].message, "worker-1 down");
        assert_eq!(occs[0].severity, "warning");
    }

    #[test]
    fn trailing_run_closes_one_step_after_last_firing() {
        let samples = series(&[(0, true), (60, true)]);
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start_time, ts(0));
        assert_eq!(occs[0].end_time, Some(ts(120)));
        assert_eq!(occs[0].duration_secs, 120);
    }

    #[test]
    fn trailing_run_deferred_when_live() {
        let samples = series(&[(0, true), (60, true)]);
        assert!(reconstruct(&samples, "id", &meta(), true, step()).is_empty());
    }

    #[test]
    fn live_only_defers_trailing_run() {
        let samples = series(&[(0, true), (60, false), (120, true)]);
        let occs = reconstruct(&samples, "id", &meta(), true, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].end_time, Some(ts(60)));
    }

    #[test]
    fn single_firing_sample_lasts_one_default_step() {
        let samples = series(&[(300, true)]);
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].end_time, Some(ts(360)));
        assert_eq!(occs[0].duration_secs, 60);
    }

    #[test]
    fn disjoint_runs_have_distinct_uids() {
        let samples = series(&[
            (0, true),
            (60, false),
            (120, true),
            (180, true),
            (240, false),
        ]);
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 2);
        assert_eq!(occs[0].identity, occs[1].identity);
        assert_ne!(occs[0].uid, occs[1].uid);
        assert_eq!(occs[0].uid, "id@0");
        assert_eq!(occs[1].uid, "id@120000");
    }

    #[test]
    fn out_of_order_samples_skipped() {
        let samples = series(&[(0, false), (60, true), (30, false), (120, false)]);
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start_time, ts(60));
        assert_eq!(occs[0].end_time, Some(ts(120)));
    }

    #[test]
    fn duplicate_timestamp_skipped() {
        let samples = series(&[(0, true), (0, false), (60, false)]);
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].end_time, Some(ts(60)));
    }

    #[test]
    fn extreme_step_ends_run_at_last_firing_sample() {
        let far = 8_000_000_000_000;
        let samples = vec![
            RawSample::from_unix_secs(-8.0e12, false).unwrap(),
            RawSample::from_unix_secs(8.0e12, true).unwrap(),
        ];
        let occs = reconstruct(&samples, "id", &meta(), false, step());
        assert_eq!(occs.len(), 1);
        assert_eq!(occs[0].start_time, ts(far));
        assert_eq!(occs[0].end_time, Some(ts(far)));
        assert_eq!(occs[0].duration_secs, 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn durations_never_negative(
                flags in prop::collection::vec(any::<bool>(), 0..64),
                gap in 1i64..600,
                live in any::<bool>(),
            ) {
                let samples: Vec<RawSample> = flags
                    .iter()
                    .enumerate()
                    .map(|(i, f)| RawSample::new(ts(i as i64 * gap), *f))
                    .collect();
                for occ in reconstruct(&samples, "id", &meta(), live, step()) {
                    let end = occ.end_time.unwrap();
                    prop_assert!(occ.start_time <= end);
                    prop_assert_eq!(occ.duration_secs as i64, (end - occ.start_time).num_seconds());
                    prop_assert!(occ.duration_secs > 0);
                }
            }

            #[test]
            fn one_occurrence_per_run(flags in prop::collection::vec(any::<bool>(), 0..64)) {
                let samples: Vec<RawSample> = flags
                    .iter()
                    .enumerate()
                    .map(|(i, f)| RawSample::new(ts(i as i64 * 60), *f))
                    .collect();
                let runs = flags
                    .iter()
                    .enumerate()
                    .filter(|(i, f)| **f && (*i == 0 || !flags[i - 1]))
                    .count();
                let occs = reconstruct(&samples, "id", &meta(), false, step());
                prop_assert_eq!(occs.len(), runs);
            }
        }
    }
}
