//! Session-scoped collection state: relevance filter, profile cache,
//! duplicate tracking, run counters, and the buffered flush pipeline that
//! both the stream consumer and the search crawler feed.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use skygather_core::{AuthorSnapshot, Post};

use crate::error::CollectError;
use crate::filter::KeywordFilter;
use crate::profile::{ProfileCache, ProfileSource};

/// Errors a sink may surface; boxed because sinks live in downstream crates.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Destination for flushed batches of relevant posts.
#[async_trait]
pub trait PostSink: Send {
    /// Persist a batch and return how many posts were written.
    async fn flush(&mut self, posts: Vec<Post>) -> Result<usize, SinkError>;
}

/// When to drain the buffer: whichever of the two thresholds trips first.
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    pub max_buffered: usize,
    pub max_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            max_buffered: 25,
            max_interval: Duration::from_secs(120),
        }
    }
}

const PROGRESS_INTERVAL: Duration = Duration::from_secs(60);

/// Counters for one collection run.
#[derive(Debug)]
pub struct RunStats {
    pub total_processed: u64,
    pub total_relevant: u64,
    pub duplicates_skipped: u64,
    pub errors: u64,
    pub topic_matches: BTreeMap<String, u64>,
    started: Instant,
    last_progress: Instant,
}

impl RunStats {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            total_processed: 0,
            total_relevant: 0,
            duplicates_skipped: 0,
            errors: 0,
            topic_matches: BTreeMap::new(),
            started: now,
            last_progress: now,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn maybe_log_progress(&mut self) {
        if self.last_progress.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        self.last_progress = Instant::now();
        tracing::info!(
            processed = self.total_processed,
            relevant = self.total_relevant,
            duplicates = self.duplicates_skipped,
            errors = self.errors,
            elapsed_secs = self.started.elapsed().as_secs(),
            "collection progress"
        );
    }
}

/// One instance per session. Owns the seen-set, the profile cache, and the
/// outgoing buffer; the stream and search pipelines share it so duplicates
/// are caught across methods within a run.
pub struct Collector {
    filter: KeywordFilter,
    cache: ProfileCache,
    seen: HashSet<String>,
    pub stats: RunStats,
    buffer: Vec<Post>,
    last_flush: Instant,
    policy: FlushPolicy,
    session_name: String,
}

impl Collector {
    /// `seen` is seeded from the durable corpus so posts already merged in
    /// earlier sessions are skipped on sight.
    #[must_use]
    pub fn new(filter: KeywordFilter, seen: HashSet<String>, policy: FlushPolicy, session_name: String) -> Self {
        Self {
            filter,
            cache: ProfileCache::new(),
            seen,
            stats: RunStats::new(),
            buffer: Vec::new(),
            last_flush: Instant::now(),
            policy,
            session_name,
        }
    }

    #[must_use]
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    #[must_use]
    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Classify post text against the topic catalog.
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<String> {
        self.filter.classify(text).map(String::from)
    }

    pub fn record_processed(&mut self) {
        self.stats.total_processed += 1;
        self.stats.maybe_log_progress();
    }

    pub fn record_error(&mut self) {
        self.stats.errors += 1;
    }

    /// Mark `uri` as seen. Returns false (and counts a duplicate) when the
    /// uri was already known, either from this run or the durable corpus.
    pub fn note_seen(&mut self, uri: &str) -> bool {
        if self.seen.insert(uri.to_string()) {
            true
        } else {
            self.stats.duplicates_skipped += 1;
            false
        }
    }

    pub async fn resolve_author(
        &mut self,
        source: &dyn ProfileSource,
        did: &str,
    ) -> AuthorSnapshot {
        self.cache.resolve(source, did).await
    }

    /// Buffer a relevant post. Callers must have claimed the uri through
    /// [`Collector::note_seen`] first.
    pub fn accept(&mut self, post: Post) {
        self.stats.total_relevant += 1;
        *self.stats.topic_matches.entry(post.topic.clone()).or_insert(0) += 1;
        self.buffer.push(post);
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn should_flush(&self) -> bool {
        !self.buffer.is_empty()
            && (self.buffer.len() >= self.policy.max_buffered
                || self.last_flush.elapsed() >= self.policy.max_interval)
    }

    /// Drain the buffer into `sink`. A no-op on an empty buffer, so callers
    /// can invoke it unconditionally at shutdown.
    pub async fn flush_into(&mut self, sink: &mut dyn PostSink) -> Result<usize, CollectError> {
        self.last_flush = Instant::now();
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(&mut self.buffer);
        let count = batch.len();
        let written = sink.flush(batch).await.map_err(CollectError::Sink)?;
        tracing::debug!(buffered = count, written, "flushed post buffer");
        Ok(written)
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod tests;
