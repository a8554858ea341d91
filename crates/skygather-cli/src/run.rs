//! Session coordinator: wires configuration, authentication, the collection
//! pipelines, and the end-of-session merge together.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use skygather_collector::{
    BskyClient, Collector, CrawlOptions, CrawlWindow, FlushPolicy, KeywordFilter,
    PollingTransport, PostSink, SearchCrawler, SinkError, StreamConsumer,
};
use skygather_core::session::SessionSummary;
use skygather_core::{AppConfig, Post, TopicCatalog};
use skygather_corpus::{merge_session, CorpusStore, SessionLog};

use crate::{Cli, Method};

/// Share of a hybrid run's duration spent on the search crawl; the stream
/// consumer gets the remainder.
const HYBRID_SEARCH_SHARE: f64 = 0.75;

/// Sink that appends flushed batches to the session log.
struct SessionWriter {
    log: SessionLog,
}

#[async_trait]
impl PostSink for SessionWriter {
    async fn flush(&mut self, posts: Vec<Post>) -> Result<usize, SinkError> {
        self.log
            .append(&posts)
            .await
            .map_err(|e| Box::new(e) as SinkError)
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let session_name = cli
        .session_name
        .clone()
        .unwrap_or_else(default_session_name);
    let catalog = load_catalog(&config, cli.topics.as_deref())?;
    let window = CrawlWindow {
        since: parse_bound(cli.since.as_deref(), false)?,
        until: parse_bound(cli.until.as_deref(), true)?,
    };
    let planned = cli.duration.map(Duration::from_secs);
    if matches!(cli.method, Method::Stream | Method::Hybrid) && planned.is_none() {
        bail!("--duration is required for {} runs", cli.method);
    }

    let store = CorpusStore::new(config.data_dir.clone());
    store.ensure_layout(&session_name).await?;

    let mut client = BskyClient::new(&config)?;
    client
        .login(&config.identifier, &config.app_password)
        .await
        .context("authentication failed")?;

    let seen = store.load_seen_uris().await?;
    tracing::info!(
        session = %session_name,
        method = %cli.method,
        topics = catalog.topics.len(),
        known_uris = seen.len(),
        "session starting"
    );

    let policy = FlushPolicy {
        max_buffered: config.flush_max_buffered,
        max_interval: Duration::from_secs(config.flush_max_interval_secs),
    };
    let mut collector = Collector::new(
        KeywordFilter::new(&catalog),
        seen,
        policy,
        session_name.clone(),
    );
    let mut sink = SessionWriter {
        log: SessionLog::new(&store, &session_name),
    };

    let stop = Arc::new(AtomicBool::new(false));
    spawn_ctrlc_handler(Arc::clone(&stop));

    let started_at = Utc::now();
    let started = Instant::now();
    let deadline = planned.map(|d| started + d);

    let options = CrawlOptions {
        inter_page_delay: Duration::from_millis(config.inter_page_delay_ms),
        inter_query_delay: Duration::from_millis(config.inter_query_delay_ms),
        max_posts: cli.max_posts,
        deadline,
        ..CrawlOptions::default()
    };

    let run_result = match cli.method {
        Method::Search => {
            let mut crawler = SearchCrawler::new(window, options, Arc::clone(&stop));
            crawler
                .run(&client, &client, &catalog, &mut collector, &mut sink)
                .await
        }
        Method::Stream => {
            run_stream(&config, &client, &catalog, deadline, &stop, &mut collector, &mut sink)
                .await
        }
        Method::Hybrid => {
            let search_deadline =
                planned.map(|d| started + hybrid_search_duration(d));
            let search_options = CrawlOptions {
                deadline: search_deadline,
                ..options
            };
            let mut crawler = SearchCrawler::new(window, search_options, Arc::clone(&stop));
            let search_result = crawler
                .run(&client, &client, &catalog, &mut collector, &mut sink)
                .await;
            match search_result {
                Ok(()) if !stop.load(Ordering::SeqCst) => {
                    run_stream(
                        &config,
                        &client,
                        &catalog,
                        deadline,
                        &stop,
                        &mut collector,
                        &mut sink,
                    )
                    .await
                }
                other => other,
            }
        }
    };

    // Finalize on every path so an aborted run still leaves a merged corpus
    // and a summary behind.
    if let Err(err) = collector.flush_into(&mut sink).await {
        tracing::error!(error = %err, "final flush failed");
    }
    let summary = build_summary(cli.method, &collector, started_at, planned);
    let report = merge_session(&store, &sink.log)
        .await
        .context("corpus merge failed")?;
    store
        .write_summary(&session_name, &summary)
        .await
        .context("summary write failed")?;
    tracing::info!(
        merged = report.merged,
        duplicates = report.duplicates,
        corpus_total = report.corpus_total,
        relevant = summary.total_relevant,
        processed = summary.total_processed,
        "session complete"
    );

    run_result.map_err(Into::into)
}

async fn run_stream(
    config: &AppConfig,
    client: &BskyClient,
    catalog: &TopicCatalog,
    deadline: Option<Instant>,
    stop: &Arc<AtomicBool>,
    collector: &mut Collector,
    sink: &mut SessionWriter,
) -> Result<(), skygather_collector::CollectError> {
    let queries: Vec<String> = catalog
        .topics
        .iter()
        .flat_map(|t| t.queries.clone())
        .collect();
    let mut transport = PollingTransport::new(
        Arc::new(client.clone()),
        queries,
        Some(Duration::from_secs(config.stream_poll_interval_secs)),
    );
    let mut consumer = StreamConsumer::new(deadline, Arc::clone(stop));
    consumer.run(&mut transport, client, collector, sink).await
}

/// The `--topics` flag wins over the configured path; with neither set the
/// built-in catalog is used.
fn load_catalog(config: &AppConfig, flag: Option<&Path>) -> Result<TopicCatalog> {
    match flag.or(config.topics_path.as_deref()) {
        Some(path) => TopicCatalog::from_yaml_file(path)
            .with_context(|| format!("failed to load topics from {}", path.display())),
        None => Ok(TopicCatalog::default()),
    }
}

fn default_session_name() -> String {
    format!("session_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Accepts a bare date or a full RFC 3339 timestamp. Bare dates expand to
/// the start of day for `since` and the end of day for `until`.
fn parse_bound(raw: Option<&str>, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date bound: {raw}"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .unwrap_or_default();
    Ok(Some(date.and_time(time).and_utc()))
}

fn hybrid_search_duration(total: Duration) -> Duration {
    total.mul_f64(HYBRID_SEARCH_SHARE)
}

fn build_summary(
    method: Method,
    collector: &Collector,
    started_at: DateTime<Utc>,
    planned: Option<Duration>,
) -> SessionSummary {
    let cache = collector.cache();
    SessionSummary {
        session_name: collector.session_name().to_string(),
        method: method.to_string(),
        started_at,
        ended_at: Utc::now(),
        planned_duration_secs: planned.map(|d| d.as_secs()),
        actual_duration_secs: collector.stats.elapsed().as_secs(),
        total_processed: collector.stats.total_processed,
        total_relevant: collector.stats.total_relevant,
        duplicates_skipped: collector.stats.duplicates_skipped,
        errors: collector.stats.errors,
        profiles_fetched: cache.fetched,
        profiles_cached: cache.cached,
        profile_cache_size: cache.len(),
        topic_matches: collector.stats.topic_matches.clone(),
        follower_stats: cache.follower_stats.clone(),
    }
}

fn spawn_ctrlc_handler(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, draining");
            stop.store(true, Ordering::SeqCst);
        }
    });
}
