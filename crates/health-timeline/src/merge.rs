//! Merging of historical reconstructions with the live feed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::AlertOccurrence;

/// Merges historical and live occurrences into one timeline.
///
/// The live feed is authoritative: any historical occurrence sharing an
/// identity with a live one is dropped. Historical entries that are still
/// open or end after `now` are dropped as malformed. Entries repeating an
/// `identity + start_time` pair keep the later-observed value. The result is
/// ordered newest first.
#[must_use]
pub fn merge(
    historical: Vec<AlertOccurrence>,
    live: Vec<AlertOccurrence>,
    now: DateTime<Utc>,
) -> Vec<AlertOccurrence> {
    let historical_in = historical.len();
    let live_identities: HashSet<String> = live.iter().map(|o| o.identity.clone()).collect();

    let mut merged: Vec<AlertOccurrence> = Vec::with_capacity(historical.len() + live.len());
    let mut by_key: HashMap<(String, DateTime<Utc>), usize> = HashMap::new();

    for occ in historical {
        if live_identities.contains(&occ.identity) {
            continue;
        }
        if occ.end_time.is_none_or(|end| end > now) {
            debug!(uid = %occ.uid, "dropping unconcluded historical occurrence");
            continue;
        }
        upsert(&mut merged, &mut by_key, (occ.identity.clone(), occ.start_time), occ);
    }
    let historical_kept = merged.len();

    let mut live_by_identity: HashMap<String, usize> = HashMap::new();
    for occ in live {
        if let Some(&idx) = live_by_identity.get(&occ.identity) {
            merged[idx] = occ;
        } else {
            live_by_identity.insert(occ.identity.clone(), merged.len());
            merged.push(occ);
        }
    }

    merged.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.identity.cmp(&b.identity))
    });

    debug!(
        historical_in,
        historical_kept,
        live = live_by_identity.len(),
        "merged timeline"
    );

    merged
}

fn upsert(
    merged: &mut Vec<AlertOccurrence>,
    by_key: &mut HashMap<(String, DateTime<Utc>), usize>,
    key: (String, DateTime<Utc>),
    occ: AlertOccurrence,
) {
    if let Some(&idx) = by_key.get(&key) {
        merged[idx] = occ;
    } else {
        by_key.insert(key, merged.len());
        merged.push(occ);
    }
}
