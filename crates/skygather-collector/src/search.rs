//! Pull-based paginated search crawler.
//!
//! Iterates the topic catalog's query lists against the search endpoint,
//! newest first. Pagination for each query runs until the cursor ends, the
//! window's start date is reached, or a global stop condition (post cap,
//! deadline, shutdown flag) trips. Per-query failures abandon that query and
//! move on; only authentication failures abort the whole crawl.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skygather_core::{CollectionMethod, Post, TopicCatalog};

use crate::collector::{Collector, PostSink};
use crate::error::CollectError;
use crate::features::FeatureExtractor;
use crate::profile::ProfileSource;
use crate::types::{PostRecordView, SearchPage};

/// Minimum text length for a post to be worth keeping.
pub(crate) const MIN_TEXT_LEN: usize = 10;

/// External search collaborator; one page per call.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search_page(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPage, CollectError>;
}

/// Date bounds for the crawl, both inclusive and both optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Tuning knobs for the crawler; defaults mirror production politeness.
#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    pub page_size: u32,
    pub inter_page_delay: Duration,
    pub inter_query_delay: Duration,
    pub max_posts: Option<u64>,
    pub deadline: Option<Instant>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            page_size: 25,
            inter_page_delay: Duration::from_millis(500),
            inter_query_delay: Duration::from_millis(1000),
            max_posts: None,
            deadline: None,
        }
    }
}

/// Why pagination for one query ended.
#[derive(Debug, PartialEq, Eq)]
enum QueryEnd {
    Exhausted,
    ReachedWindowStart,
    StopRequested,
    Abandoned,
}

pub struct SearchCrawler {
    window: CrawlWindow,
    options: CrawlOptions,
    stop: Arc<AtomicBool>,
    /// Resume cursors per (topic, query), kept for the lifetime of the run.
    cursors: HashMap<(String, String), String>,
    extractor: FeatureExtractor,
}

impl SearchCrawler {
    #[must_use]
    pub fn new(window: CrawlWindow, options: CrawlOptions, stop: Arc<AtomicBool>) -> Self {
        Self {
            window,
            options,
            stop,
            cursors: HashMap::new(),
            extractor: FeatureExtractor::new(),
        }
    }

    fn stop_requested(&self, collector: &Collector) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            return true;
        }
        if self
            .options
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            return true;
        }
        self.options
            .max_posts
            .is_some_and(|max| collector.stats.total_relevant >= max)
    }

    /// Number of posts still wanted, capped at the page size.
    fn page_limit(&self, collector: &Collector) -> u32 {
        let Some(max) = self.options.max_posts else {
            return self.options.page_size;
        };
        let remaining = max.saturating_sub(collector.stats.total_relevant);
        u32::try_from(remaining)
            .unwrap_or(self.options.page_size)
            .clamp(1, self.options.page_size)
    }

    /// Crawl every query of every topic once, flushing through `sink` as the
    /// buffer fills. Returns after the catalog is exhausted or a stop
    /// condition trips.
    pub async fn run(
        &mut self,
        source: &dyn SearchSource,
        profiles: &dyn ProfileSource,
        catalog: &TopicCatalog,
        collector: &mut Collector,
        sink: &mut dyn PostSink,
    ) -> Result<(), CollectError> {
        'topics: for topic in &catalog.topics {
            for query in &topic.queries {
                if self.stop_requested(collector) {
                    break 'topics;
                }
                let end = self
                    .crawl_query(source, profiles, &topic.name, query, collector, sink)
                    .await?;
                tracing::debug!(topic = %topic.name, query, ?end, "query crawl finished");
                if end == QueryEnd::StopRequested {
                    break 'topics;
                }
                tokio::time::sleep(self.options.inter_query_delay).await;
            }
        }
        collector.flush_into(sink).await?;
        Ok(())
    }

    async fn crawl_query(
        &mut self,
        source: &dyn SearchSource,
        profiles: &dyn ProfileSource,
        topic: &str,
        query: &str,
        collector: &mut Collector,
        sink: &mut dyn PostSink,
    ) -> Result<QueryEnd, CollectError> {
        let cursor_key = (topic.to_string(), query.to_string());
        loop {
            if self.stop_requested(collector) {
                return Ok(QueryEnd::StopRequested);
            }
            let limit = self.page_limit(collector);
            let cursor = self.cursors.get(&cursor_key).cloned();
            let page = match source.search_page(query, limit, cursor.as_deref()).await {
                Ok(page) => page,
                Err(err @ CollectError::Unauthorized { .. }) => return Err(err),
                Err(err) => {
                    // The stored cursor survives so a later crawl in the
                    // same run resumes where this one failed.
                    tracing::warn!(topic, query, error = %err, "search query abandoned");
                    collector.record_error();
                    return Ok(QueryEnd::Abandoned);
                }
            };

            let mut reached_start = false;
            for hit in &page.posts {
                collector.record_processed();
                let record: PostRecordView = match serde_json::from_value(hit.record.clone()) {
                    Ok(record) => record,
                    Err(_) => {
                        collector.record_error();
                        continue;
                    }
                };
                let Ok(created_at) = DateTime::parse_from_rfc3339(&record.created_at) else {
                    collector.record_error();
                    continue;
                };
                let created_at = created_at.with_timezone(&Utc);

                // Results are newest first, so crossing the window start
                // means every later hit is older still. Stop scanning the
                // rest of the page.
                if self.window.since.is_some_and(|since| created_at < since) {
                    reached_start = true;
                    break;
                }
                if self.window.until.is_some_and(|until| created_at > until) {
                    continue;
                }
                if record.text.chars().count() < MIN_TEXT_LEN {
                    continue;
                }
                let Some(matched_topic) = collector.classify(&record.text) else {
                    continue;
                };
                if !collector.note_seen(&hit.uri) {
                    continue;
                }

                let author = collector.resolve_author(profiles, &hit.author.did).await;
                let features = self.extractor.extract(&record.text, &record);
                collector.accept(Post {
                    uri: hit.uri.clone(),
                    cid: hit.cid.clone(),
                    text: record.text.clone(),
                    created_at,
                    author_handle: hit.author.handle.clone(),
                    author_did: hit.author.did.clone(),
                    topic: matched_topic,
                    method: CollectionMethod::Search,
                    search_query: Some(query.to_string()),
                    session_name: collector.session_name().to_string(),
                    collected_at: Utc::now(),
                    lang: record.primary_lang(),
                    features,
                    indexed_at: hit.indexed_at.clone(),
                    reply_count: hit.reply_count,
                    repost_count: hit.repost_count,
                    like_count: hit.like_count,
                    author,
                });
                if collector.should_flush() {
                    collector.flush_into(sink).await?;
                }
            }

            if reached_start {
                return Ok(QueryEnd::ReachedWindowStart);
            }
            match page.cursor {
                Some(next) => {
                    self.cursors.insert(cursor_key.clone(), next);
                }
                None => {
                    self.cursors.remove(&cursor_key);
                    return Ok(QueryEnd::Exhausted);
                }
            }
            tokio::time::sleep(self.options.inter_page_delay).await;
        }
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
