//! Alert timeline reconstruction and silence matching for infrastructure health views.
//!
//! `health-timeline` turns sampled boolean alert series and a live "currently
//! firing" feed into a deduplicated, newest-first list of alert occurrences,
//! and tells which of them are suppressed by active silences.
//!
//! # Features
//!
//! - **Interval Reconstruction**: Rebuild firing intervals from range query samples
//! - **Live Feed Merging**: The live feed is authoritative for alerts still firing
//! - **Stable Identities**: Alert instances keyed by name and labels, ignoring `alertstate`
//! - **Silences**: Alertmanager-style equality and regex matchers, with negation
//! - **Payload Decoding**: Prometheus and Alertmanager API responses
//!
//! Every operation is a pure function of its inputs. Nothing is cached or
//! persisted between refreshes.
//!
//! # Example
//!
//! ```rust
//! use chrono::DateTime;
//! use health_timeline::{reconstruct, AlertMeta, Labels, RawSample};
//!
//! let at = |secs| DateTime::from_timestamp(secs, 0).unwrap();
//! let samples = vec![
//!     RawSample::new(at(0), false),
//!     RawSample::new(at(60), true),
//!     RawSample::new(at(120), true),
//!     RawSample::new(at(180), false),
//! ];
//!
//! let mut labels = Labels::new();
//! labels.insert("node".to_string(), "worker-1".to_string());
//! let meta = AlertMeta::new("NodeDown", labels, "critical", Some("{{ $labels.node }} is down"));
//!
//! let occurrences = reconstruct(&samples, "NodeDown|node=worker-1", &meta, false, chrono::Duration::seconds(60));
//! assert_eq!(occurrences.len(), 1);
//! assert_eq!(occurrences[0].duration_secs, 120);
//! assert_eq!(occurrences[0].message, "worker-1 is down");
//! ```
//!
//! # Silencing
//!
//! ```rust
//! use chrono::Utc;
//! use health_timeline::{silence, Labels, Matcher, Silence};
//!
//! let s = Silence::new(
//!     "maintenance",
//!     vec![Matcher::regex("node", "^worker").negated()],
//!     Utc::now(),
//!     None,
//! )
//! .unwrap();
//!
//! let mut labels = Labels::new();
//! labels.insert("node".to_string(), "master-0".to_string());
//! assert!(silence::matches(&labels, &s));
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/health-timeline/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod live;
pub mod merge;
pub mod reconstruct;
pub mod rules;
pub mod silence;
pub mod source;
pub mod template;
pub mod types;

// Re-export main types at crate root
pub use config::TimelineConfig;
pub use engine::{build_timeline, HealthSnapshot, Timeline};
pub use error::{Result, TimelineError};
pub use identity::build_identity;
pub use live::{adapt, LiveAlert};
pub use merge::merge;
pub use reconstruct::{reconstruct, ScanState};
pub use rules::{Rule, RuleCatalog, RuleGroup, RuleKind};
pub use silence::{filter_active, is_silenced, Matcher, Silence, SilenceFilter, SilenceState};
pub use source::{
    decode_alerts, decode_range_query, decode_rules, decode_silences, SeriesSnapshot,
};
pub use types::{
    AlertMeta, AlertOccurrence, Labels, OccurrenceSource, OccurrenceState, RawSample,
};
