//! Session summary: the immutable record of one collector run, written once
//! at shutdown next to the session log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running min/max/sum aggregate over observed follower counts.
///
/// Zero-follower authors are not recorded, mirroring the progress reports
/// which only care about accounts with an audience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerStats {
    pub min: u64,
    pub max: u64,
    pub total: u64,
    pub count: u64,
}

impl FollowerStats {
    pub fn record(&mut self, followers: u64) {
        if followers == 0 {
            return;
        }
        if self.count == 0 {
            self.min = followers;
        } else {
            self.min = self.min.min(followers);
        }
        self.max = self.max.max(followers);
        self.total += followers;
        self.count += 1;
    }

    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.total as f64 / self.count as f64)
    }
}

/// The document written as `session_summary.json` when a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_name: String,
    pub method: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub planned_duration_secs: Option<u64>,
    pub actual_duration_secs: u64,
    pub total_processed: u64,
    pub total_relevant: u64,
    pub duplicates_skipped: u64,
    pub errors: u64,
    pub profiles_fetched: u64,
    pub profiles_cached: u64,
    pub profile_cache_size: usize,
    /// Per-topic match histogram.
    pub topic_matches: BTreeMap<String, u64>,
    pub follower_stats: FollowerStats,
}
