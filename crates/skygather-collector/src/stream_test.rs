use std::collections::{HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use skygather_core::{CollectionMethod, Post, TopicCatalog, TopicSpec};

use super::{
    ConsumerState, PollingTransport, RepoEvent, RepoOp, StreamConsumer, SubscriptionTransport,
};
use crate::collector::{Collector, FlushPolicy, PostSink, SinkError};
use crate::error::CollectError;
use crate::filter::KeywordFilter;
use crate::profile::ProfileSource;
use crate::search::SearchSource;
use crate::types::{ProfileView, SearchPage};

struct ScriptedTransport {
    events: VecDeque<Result<Option<RepoEvent>, CollectError>>,
    connect_error: Option<CollectError>,
    shutdown_called: bool,
}

impl ScriptedTransport {
    fn new(events: Vec<Result<Option<RepoEvent>, CollectError>>) -> Self {
        Self {
            events: events.into(),
            connect_error: None,
            shutdown_called: false,
        }
    }
}

#[async_trait]
impl SubscriptionTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<(), CollectError> {
        match self.connect_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn next_event(&mut self) -> Result<Option<RepoEvent>, CollectError> {
        self.events.pop_front().unwrap_or(Ok(None))
    }

    async fn shutdown(&mut self) -> Result<(), CollectError> {
        self.shutdown_called = true;
        Ok(())
    }
}

struct FakeProfiles;

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn fetch_profile(&self, did: &str) -> Result<ProfileView, CollectError> {
        Ok(serde_json::from_value(json!({
            "did": did,
            "handle": "streamer.test",
            "followersCount": 42,
            "followsCount": 7,
            "postsCount": 10
        }))
        .unwrap())
    }
}

struct CollectingSink {
    posts: Vec<Post>,
    flushes: usize,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            posts: Vec::new(),
            flushes: 0,
        }
    }
}

#[async_trait]
impl PostSink for CollectingSink {
    async fn flush(&mut self, posts: Vec<Post>) -> Result<usize, SinkError> {
        let count = posts.len();
        self.flushes += 1;
        self.posts.extend(posts);
        Ok(count)
    }
}

fn catalog() -> TopicCatalog {
    TopicCatalog {
        topics: vec![TopicSpec {
            name: "housing".to_string(),
            patterns: vec!["eviction".to_string()],
            queries: vec!["\"eviction\"".to_string()],
        }],
    }
}

fn collector() -> Collector {
    Collector::new(
        KeywordFilter::new(&catalog()),
        HashSet::new(),
        FlushPolicy::default(),
        "test".to_string(),
    )
}

fn post_event(did: &str, rkey: &str, text: &str) -> RepoEvent {
    RepoEvent {
        repo_did: did.to_string(),
        ops: vec![RepoOp {
            action: "create".to_string(),
            path: format!("app.bsky.feed.post/{rkey}"),
            record: Some(json!({
                "text": text,
                "createdAt": Utc::now().to_rfc3339(),
            })),
        }],
    }
}

fn consumer() -> StreamConsumer {
    StreamConsumer::new(None, Arc::new(AtomicBool::new(false)))
}

#[tokio::test]
async fn relevant_create_ops_become_stream_posts() {
    let mut transport = ScriptedTransport::new(vec![
        Ok(Some(post_event("did:plc:a", "r1", "eviction notices everywhere"))),
        Ok(Some(post_event("did:plc:b", "r2", "gardening is lovely today"))),
    ]);
    let mut c = collector();
    let mut sink = CollectingSink::new();
    let mut consumer = consumer();

    consumer
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await
        .unwrap();

    assert_eq!(sink.posts.len(), 1);
    let post = &sink.posts[0];
    assert_eq!(post.uri, "at://did:plc:a/app.bsky.feed.post/r1");
    assert_eq!(post.method, CollectionMethod::Stream);
    assert_eq!(post.search_query, None);
    assert_eq!(post.author_handle, "streamer.test");
    assert_eq!(c.stats.total_processed, 2);
    assert_eq!(c.stats.total_relevant, 1);
}

#[tokio::test]
async fn non_post_ops_are_ignored() {
    let event = RepoEvent {
        repo_did: "did:plc:a".to_string(),
        ops: vec![
            RepoOp {
                action: "delete".to_string(),
                path: "app.bsky.feed.post/r1".to_string(),
                record: None,
            },
            RepoOp {
                action: "create".to_string(),
                path: "app.bsky.feed.like/r2".to_string(),
                record: Some(json!({})),
            },
        ],
    };
    let mut transport = ScriptedTransport::new(vec![Ok(Some(event))]);
    let mut c = collector();
    let mut sink = CollectingSink::new();

    consumer()
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await
        .unwrap();

    assert_eq!(c.stats.total_processed, 0);
    assert!(sink.posts.is_empty());
}

#[tokio::test]
async fn short_text_is_dropped_before_classification() {
    let mut transport =
        ScriptedTransport::new(vec![Ok(Some(post_event("did:plc:a", "r1", "eviction")))]);
    let mut c = collector();
    let mut sink = CollectingSink::new();

    consumer()
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await
        .unwrap();

    // "eviction" matches the topic but is under the length floor.
    assert!(sink.posts.is_empty());
    assert_eq!(c.stats.total_processed, 1);
}

#[tokio::test]
async fn stream_end_drains_with_one_final_flush() {
    let mut transport = ScriptedTransport::new(vec![Ok(Some(post_event(
        "did:plc:a",
        "r1",
        "eviction notices everywhere",
    )))]);
    let mut c = collector();
    let mut sink = CollectingSink::new();
    let mut consumer = consumer();

    consumer
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await
        .unwrap();

    // Buffer stayed under the flush threshold; only the drain flushed.
    assert_eq!(sink.flushes, 1);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
    assert!(transport.shutdown_called);
}

#[tokio::test]
async fn preset_stop_flag_skips_straight_to_drain() {
    let stop = Arc::new(AtomicBool::new(true));
    let mut transport = ScriptedTransport::new(vec![Ok(Some(post_event(
        "did:plc:a",
        "r1",
        "eviction notices everywhere",
    )))]);
    let mut c = collector();
    let mut sink = CollectingSink::new();
    let mut consumer = StreamConsumer::new(None, stop);

    consumer
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await
        .unwrap();

    assert!(sink.posts.is_empty());
    assert!(transport.shutdown_called);
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn transient_event_errors_are_counted_and_skipped() {
    let mut transport = ScriptedTransport::new(vec![
        Err(CollectError::MalformedRecord {
            reason: "bad frame".to_string(),
        }),
        Ok(Some(post_event("did:plc:a", "r1", "eviction notices everywhere"))),
    ]);
    let mut c = collector();
    let mut sink = CollectingSink::new();

    consumer()
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await
        .unwrap();

    assert_eq!(c.stats.errors, 1);
    assert_eq!(sink.posts.len(), 1);
}

#[tokio::test]
async fn auth_failure_mid_stream_is_fatal() {
    let mut transport = ScriptedTransport::new(vec![Err(CollectError::Unauthorized {
        detail: "token expired".to_string(),
    })]);
    let mut c = collector();
    let mut sink = CollectingSink::new();

    let result = consumer()
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await;

    assert!(matches!(result, Err(CollectError::Unauthorized { .. })));
}

#[tokio::test]
async fn connect_failure_is_fatal() {
    let mut transport = ScriptedTransport::new(vec![]);
    transport.connect_error = Some(CollectError::Transport {
        detail: "refused".to_string(),
    });
    let mut c = collector();
    let mut sink = CollectingSink::new();

    let result = consumer()
        .run(&mut transport, &FakeProfiles, &mut c, &mut sink)
        .await;

    assert!(matches!(result, Err(CollectError::Transport { .. })));
}

struct ScriptedSearch {
    pages: Mutex<Vec<SearchPage>>,
}

#[async_trait]
impl SearchSource for ScriptedSearch {
    async fn search_page(
        &self,
        _query: &str,
        _limit: u32,
        _cursor: Option<&str>,
    ) -> Result<SearchPage, CollectError> {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(SearchPage::default())
        } else {
            Ok(pages.remove(0))
        }
    }
}

fn search_page_with(uri: &str, did: &str, created_at: &str) -> SearchPage {
    serde_json::from_value(json!({
        "posts": [{
            "uri": uri,
            "cid": "cid",
            "author": { "did": did, "handle": "poll.test" },
            "record": { "text": "eviction notices everywhere", "createdAt": created_at }
        }]
    }))
    .unwrap()
}

#[tokio::test]
async fn polling_transport_replays_fresh_hits_once() {
    let now = Utc::now().to_rfc3339();
    let uri = "at://did:plc:a/app.bsky.feed.post/r1";
    let source = Arc::new(ScriptedSearch {
        pages: Mutex::new(vec![
            search_page_with(uri, "did:plc:a", &now),
            // Second poll returns the same hit; it must not be re-delivered.
            search_page_with(uri, "did:plc:a", &now),
            search_page_with("at://did:plc:b/app.bsky.feed.post/r2", "did:plc:b", &now),
        ]),
    });
    let mut transport = PollingTransport::new(
        source,
        vec!["\"eviction\"".to_string()],
        Some(Duration::ZERO),
    );
    transport.connect().await.unwrap();

    let first = transport.next_event().await.unwrap().unwrap();
    assert_eq!(first.repo_did, "did:plc:a");
    assert_eq!(first.ops[0].path, "app.bsky.feed.post/r1");

    let second = transport.next_event().await.unwrap().unwrap();
    assert_eq!(second.repo_did, "did:plc:b");
}

#[tokio::test]
async fn polling_transport_skips_stale_hits() {
    let stale = (Utc::now() - chrono::Duration::hours(48)).to_rfc3339();
    let fresh = Utc::now().to_rfc3339();
    let source = Arc::new(ScriptedSearch {
        pages: Mutex::new(vec![
            search_page_with("at://did:plc:old/app.bsky.feed.post/r1", "did:plc:old", &stale),
            search_page_with("at://did:plc:new/app.bsky.feed.post/r2", "did:plc:new", &fresh),
        ]),
    });
    let mut transport = PollingTransport::new(
        source,
        vec!["\"eviction\"".to_string()],
        Some(Duration::ZERO),
    );
    transport.connect().await.unwrap();

    let event = transport.next_event().await.unwrap().unwrap();
    assert_eq!(event.repo_did, "did:plc:new");
}

#[tokio::test]
async fn polling_transport_throttles_persistent_failures() {
    struct FailingSearch;

    #[async_trait]
    impl SearchSource for FailingSearch {
        async fn search_page(
            &self,
            _query: &str,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> Result<SearchPage, CollectError> {
            Err(CollectError::UnexpectedStatus {
                status: 400,
                endpoint: "app.bsky.feed.searchPosts".to_string(),
            })
        }
    }

    let interval = Duration::from_millis(50);
    let mut transport = PollingTransport::new(
        Arc::new(FailingSearch),
        vec!["\"eviction\"".to_string()],
        Some(interval),
    );
    transport.connect().await.unwrap();

    let started = std::time::Instant::now();
    let result = transport.next_event().await;
    assert!(matches!(
        result,
        Err(CollectError::UnexpectedStatus { status: 400, .. })
    ));
    // The poll interval elapses before the error surfaces.
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn polling_transport_requires_queries() {
    let source = Arc::new(ScriptedSearch {
        pages: Mutex::new(vec![]),
    });
    let mut transport = PollingTransport::new(source, vec![], None);
    assert!(matches!(
        transport.connect().await,
        Err(CollectError::Transport { .. })
    ));
}
