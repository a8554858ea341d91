//! Push-based stream consumer.
//!
//! [`StreamConsumer`] drives an explicit state machine over a
//! [`SubscriptionTransport`]: connect, consume until a stop condition,
//! drain, stop. Stop conditions (deadline, shutdown flag) are only observed
//! at event boundaries so no event is half-processed, and the drain phase
//! performs exactly one final flush.
//!
//! [`PollingTransport`] is the bundled transport: it synthesizes repo events
//! by polling the search endpoint for recent posts. A true firehose client
//! can be plugged in through the same trait without touching the consumer.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skygather_core::{CollectionMethod, Post};

use crate::collector::{Collector, PostSink};
use crate::error::CollectError;
use crate::features::FeatureExtractor;
use crate::profile::ProfileSource;
use crate::search::{SearchSource, MIN_TEXT_LEN};
use crate::types::{PostRecordView, POST_PATH_PREFIX};

/// Lifecycle of one consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Connecting,
    Consuming,
    Draining,
    Stopped,
}

/// One repo commit event from the subscription.
#[derive(Debug, Clone)]
pub struct RepoEvent {
    pub repo_did: String,
    pub ops: Vec<RepoOp>,
}

/// A single operation within a commit.
#[derive(Debug, Clone)]
pub struct RepoOp {
    pub action: String,
    /// Collection-qualified record key, e.g. `app.bsky.feed.post/3kab...`.
    pub path: String,
    pub record: Option<serde_json::Value>,
}

/// Event source seam. `next_event` returning `Ok(None)` means the stream
/// ended for good; the consumer drains rather than reconnecting.
#[async_trait]
pub trait SubscriptionTransport: Send {
    async fn connect(&mut self) -> Result<(), CollectError>;
    async fn next_event(&mut self) -> Result<Option<RepoEvent>, CollectError>;
    async fn shutdown(&mut self) -> Result<(), CollectError>;
}

pub struct StreamConsumer {
    deadline: Option<Instant>,
    stop: Arc<AtomicBool>,
    state: ConsumerState,
    extractor: FeatureExtractor,
}

impl StreamConsumer {
    #[must_use]
    pub fn new(deadline: Option<Instant>, stop: Arc<AtomicBool>) -> Self {
        Self {
            deadline,
            stop,
            state: ConsumerState::Connecting,
            extractor: FeatureExtractor::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Consume events until the stream ends or a stop condition trips, then
    /// drain. Connect failures are fatal; per-event failures are counted and
    /// skipped.
    pub async fn run(
        &mut self,
        transport: &mut dyn SubscriptionTransport,
        profiles: &dyn ProfileSource,
        collector: &mut Collector,
        sink: &mut dyn PostSink,
    ) -> Result<(), CollectError> {
        self.state = ConsumerState::Connecting;
        transport.connect().await?;
        self.state = ConsumerState::Consuming;
        tracing::info!("stream consumer connected");

        while !self.stop_requested() {
            match transport.next_event().await {
                Ok(Some(event)) => {
                    self.handle_event(&event, profiles, collector).await;
                    if collector.should_flush() {
                        collector.flush_into(sink).await?;
                    }
                }
                Ok(None) => {
                    tracing::info!("stream ended");
                    break;
                }
                Err(err @ CollectError::Unauthorized { .. }) => {
                    self.state = ConsumerState::Stopped;
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "event skipped");
                    collector.record_error();
                }
            }
        }

        self.state = ConsumerState::Draining;
        if let Err(err) = transport.shutdown().await {
            tracing::warn!(error = %err, "transport shutdown failed");
        }
        collector.flush_into(sink).await?;
        self.state = ConsumerState::Stopped;
        tracing::info!(
            relevant = collector.stats.total_relevant,
            processed = collector.stats.total_processed,
            "stream consumer stopped"
        );
        Ok(())
    }

    async fn handle_event(
        &self,
        event: &RepoEvent,
        profiles: &dyn ProfileSource,
        collector: &mut Collector,
    ) {
        for op in &event.ops {
            if op.action != "create" || !op.path.starts_with(POST_PATH_PREFIX) {
                continue;
            }
            collector.record_processed();
            let Some(raw) = &op.record else {
                collector.record_error();
                continue;
            };
            let record: PostRecordView = match serde_json::from_value(raw.clone()) {
                Ok(record) => record,
                Err(_) => {
                    collector.record_error();
                    continue;
                }
            };
            if record.text.chars().count() < MIN_TEXT_LEN {
                continue;
            }
            let Some(topic) = collector.classify(&record.text) else {
                continue;
            };
            let Ok(created_at) = DateTime::parse_from_rfc3339(&record.created_at) else {
                collector.record_error();
                continue;
            };
            let uri = format!("at://{}/{}", event.repo_did, op.path);
            if !collector.note_seen(&uri) {
                continue;
            }

            let author = collector.resolve_author(profiles, &event.repo_did).await;
            let features = self.extractor.extract(&record.text, &record);
            collector.accept(Post {
                uri,
                cid: String::new(),
                text: record.text.clone(),
                created_at: created_at.with_timezone(&Utc),
                author_handle: author.handle.clone(),
                author_did: event.repo_did.clone(),
                topic,
                method: CollectionMethod::Stream,
                search_query: None,
                session_name: collector.session_name().to_string(),
                collected_at: Utc::now(),
                lang: record.primary_lang(),
                features,
                indexed_at: String::new(),
                reply_count: 0,
                repost_count: 0,
                like_count: 0,
                author,
            });
        }
    }
}

/// Default poll interval when none is configured.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Only posts this recent are synthesized into events.
const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Transport that approximates a live subscription by polling the search
/// endpoint round-robin over the topic queries and replaying fresh, unseen
/// hits as repo events.
pub struct PollingTransport {
    source: Arc<dyn SearchSource>,
    queries: Vec<String>,
    poll_interval: Duration,
    delivered: HashSet<String>,
    pending: VecDeque<RepoEvent>,
    next_query: usize,
}

impl PollingTransport {
    #[must_use]
    pub fn new(source: Arc<dyn SearchSource>, queries: Vec<String>, poll_interval: Option<Duration>) -> Self {
        Self {
            source,
            queries,
            poll_interval: poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            delivered: HashSet::new(),
            pending: VecDeque::new(),
            next_query: 0,
        }
    }

    async fn poll_once(&mut self) -> Result<(), CollectError> {
        if self.queries.is_empty() {
            return Ok(());
        }
        let query = self.queries[self.next_query % self.queries.len()].clone();
        self.next_query = (self.next_query + 1) % self.queries.len();

        let page = self.source.search_page(&query, 25, None).await?;
        let horizon = Utc::now() - chrono::Duration::hours(FRESHNESS_WINDOW_HOURS);
        for hit in page.posts {
            if self.delivered.contains(&hit.uri) {
                continue;
            }
            let Some(path) = hit.uri.strip_prefix(&format!("at://{}/", hit.author.did)) else {
                continue;
            };
            let fresh = serde_json::from_value::<PostRecordView>(hit.record.clone())
                .ok()
                .and_then(|record| DateTime::parse_from_rfc3339(&record.created_at).ok())
                .is_some_and(|created| created.with_timezone(&Utc) >= horizon);
            if !fresh {
                continue;
            }
            self.delivered.insert(hit.uri.clone());
            self.pending.push_back(RepoEvent {
                repo_did: hit.author.did.clone(),
                ops: vec![RepoOp {
                    action: "create".to_string(),
                    path: path.to_string(),
                    record: Some(hit.record),
                }],
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionTransport for PollingTransport {
    async fn connect(&mut self) -> Result<(), CollectError> {
        if self.queries.is_empty() {
            return Err(CollectError::Transport {
                detail: "no queries to poll".to_string(),
            });
        }
        tracing::info!(queries = self.queries.len(), "polling transport ready");
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<RepoEvent>, CollectError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if let Err(err) = self.poll_once().await {
                // The consumer retries next_event right after counting the
                // error, so throttle here or a dead endpoint gets hammered.
                tokio::time::sleep(self.poll_interval).await;
                return Err(err);
            }
            if self.pending.is_empty() && self.next_query == 0 {
                // Full cycle with nothing new; wait before the next sweep.
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), CollectError> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
