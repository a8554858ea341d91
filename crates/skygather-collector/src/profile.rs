//! Author-profile enrichment cache.
//!
//! Profiles are fetched at most once per DID per run and held for the run's
//! lifetime, with no refresh and no eviction. A failed lookup is cached too,
//! as a zeroed fallback snapshot tagged with `fetch_error`, so a misbehaving
//! DID costs one network call per run instead of one per post.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skygather_core::session::FollowerStats;
use skygather_core::AuthorSnapshot;

use crate::error::CollectError;
use crate::types::ProfileView;

/// External profile-lookup collaborator.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, did: &str) -> Result<ProfileView, CollectError>;
}

/// Run-scoped, unbounded profile cache with fetch/hit counters and a
/// follower aggregate for progress reporting.
pub struct ProfileCache {
    profiles: HashMap<String, AuthorSnapshot>,
    pub fetched: u64,
    pub cached: u64,
    pub follower_stats: FollowerStats,
}

impl ProfileCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            fetched: 0,
            cached: 0,
            follower_stats: FollowerStats::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Resolve the profile for `did`, fetching it from `source` on the
    /// first request of the run. Lookup failures never propagate: they
    /// produce (and cache) a zeroed fallback snapshot.
    pub async fn resolve(&mut self, source: &dyn ProfileSource, did: &str) -> AuthorSnapshot {
        if let Some(snapshot) = self.profiles.get(did) {
            self.cached += 1;
            return snapshot.clone();
        }

        let snapshot = match source.fetch_profile(did).await {
            Ok(view) => {
                self.follower_stats.record(view.followers_count);
                enrich(&view)
            }
            Err(err) => {
                tracing::debug!(did, error = %err, "profile lookup failed, using fallback");
                fallback(did, &err)
            }
        };
        self.fetched += 1;
        self.profiles.insert(did.to_string(), snapshot.clone());
        snapshot
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an enriched snapshot from a profile view, computing the derived
/// metrics at fetch time.
fn enrich(view: &ProfileView) -> AuthorSnapshot {
    let now = Utc::now();
    let created_at = view
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let account_age_days = created_at.map_or(0, |created| (now - created).num_days().max(0));
    #[allow(clippy::cast_precision_loss)]
    let posts_per_day = if account_age_days > 0 {
        view.posts_count as f64 / account_age_days as f64
    } else {
        0.0
    };
    #[allow(clippy::cast_precision_loss)]
    let follower_following_ratio = if view.follows_count > 0 {
        view.followers_count as f64 / view.follows_count as f64
    } else {
        view.followers_count as f64
    };

    AuthorSnapshot {
        did: view.did.clone(),
        handle: view.handle.clone(),
        display_name: view.display_name.clone().unwrap_or_default(),
        description: view.description.clone().unwrap_or_default(),
        followers_count: view.followers_count,
        following_count: view.follows_count,
        posts_count: view.posts_count,
        verified: view.verified,
        created_at,
        fetched_at: now,
        account_age_days,
        posts_per_day,
        follower_following_ratio,
        influence_score: influence_score(view.followers_count, view.posts_count, view.verified),
        fetch_error: None,
    }
}

/// Zeroed snapshot for a DID whose lookup failed; the DID doubles as the
/// handle so downstream consumers always have an identity to show.
fn fallback(did: &str, err: &CollectError) -> AuthorSnapshot {
    AuthorSnapshot {
        did: did.to_string(),
        handle: did.to_string(),
        display_name: String::new(),
        description: String::new(),
        followers_count: 0,
        following_count: 0,
        posts_count: 0,
        verified: false,
        created_at: None,
        fetched_at: Utc::now(),
        account_age_days: 0,
        posts_per_day: 0.0,
        follower_following_ratio: 0.0,
        influence_score: 0.0,
        fetch_error: Some(err.to_string()),
    }
}

/// Composite influence metric:
/// `log10(followers+1)*10 + min(followers/max(posts,1)*5, 50) + 25 if verified`,
/// rounded to two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn influence_score(followers: u64, posts: u64, verified: bool) -> f64 {
    let mut score = 0.0;
    if followers > 0 {
        score += ((followers + 1) as f64).log10() * 10.0;
        score += (followers as f64 / posts.max(1) as f64 * 5.0).min(50.0);
    }
    if verified {
        score += 25.0;
    }
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
