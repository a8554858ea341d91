use tempfile::TempDir;

use super::merge_session;
use crate::session_log::SessionLog;
use crate::store::tests::post;
use crate::store::CorpusStore;

async fn setup(session: &str) -> (TempDir, CorpusStore) {
    let dir = TempDir::new().unwrap();
    let store = CorpusStore::new(dir.path());
    store.ensure_layout(session).await.unwrap();
    (dir, store)
}

#[tokio::test]
async fn new_posts_merge_sorted_by_created_at() {
    let (_dir, store) = setup("s1").await;
    let log = SessionLog::new(&store, "s1");
    // Appended newest first, as the search crawler produces them.
    log.append(&[post("at://p/2", "housing", 20), post("at://p/1", "housing", 10)])
        .await
        .unwrap();

    let report = merge_session(&store, &log).await.unwrap();
    assert_eq!(report.merged, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.per_topic["housing"], 2);
    assert_eq!(report.corpus_total, 2);

    let corpus = store.load_topic("housing").await.unwrap();
    assert_eq!(corpus[0].uri, "at://p/1");
    assert_eq!(corpus[1].uri, "at://p/2");
    assert!(corpus[0].created_at < corpus[1].created_at);
}

#[tokio::test]
async fn uris_already_in_the_corpus_are_dropped() {
    let (_dir, store) = setup("s1").await;
    store
        .write_topic("housing", &[post("at://p/1", "housing", 10)])
        .await
        .unwrap();

    let log = SessionLog::new(&store, "s1");
    log.append(&[post("at://p/1", "housing", 10), post("at://p/2", "housing", 20)])
        .await
        .unwrap();

    let report = merge_session(&store, &log).await.unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.load_topic("housing").await.unwrap().len(), 2);
}

#[tokio::test]
async fn merging_the_same_session_twice_is_idempotent() {
    let (_dir, store) = setup("s1").await;
    let log = SessionLog::new(&store, "s1");
    log.append(&[post("at://p/1", "housing", 10)]).await.unwrap();

    let first = merge_session(&store, &log).await.unwrap();
    assert_eq!(first.merged, 1);

    let second = merge_session(&store, &log).await.unwrap();
    assert_eq!(second.merged, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.load_topic("housing").await.unwrap().len(), 1);
}

#[tokio::test]
async fn historical_corpus_duplicates_collapse() {
    let (_dir, store) = setup("s1").await;
    // Simulate an older corpus written before dedup existed.
    let dupe = post("at://p/1", "housing", 10);
    let mut raw = String::new();
    raw.push_str(&serde_json::to_string(&dupe).unwrap());
    raw.push('\n');
    raw.push_str(&serde_json::to_string(&dupe).unwrap());
    raw.push('\n');
    std::fs::write(store.alltime_jsonl_path("housing"), raw).unwrap();

    let log = SessionLog::new(&store, "s1");
    log.append(&[post("at://p/2", "housing", 20)]).await.unwrap();

    let report = merge_session(&store, &log).await.unwrap();
    assert_eq!(report.merged, 1);
    let corpus = store.load_topic("housing").await.unwrap();
    assert_eq!(corpus.len(), 2);
}

#[tokio::test]
async fn unsorted_corpus_is_resorted_even_without_new_posts() {
    let (_dir, store) = setup("s1").await;
    // Duplicate-free but out-of-order corpus file from an older run.
    let newer = post("at://p/2", "housing", 20);
    let older = post("at://p/1", "housing", 10);
    let mut raw = String::new();
    raw.push_str(&serde_json::to_string(&newer).unwrap());
    raw.push('\n');
    raw.push_str(&serde_json::to_string(&older).unwrap());
    raw.push('\n');
    std::fs::write(store.alltime_jsonl_path("housing"), raw).unwrap();

    // The session only re-offers a known uri, so nothing is added.
    let log = SessionLog::new(&store, "s1");
    log.append(&[post("at://p/1", "housing", 10)]).await.unwrap();

    let report = merge_session(&store, &log).await.unwrap();
    assert_eq!(report.merged, 0);

    let corpus = store.load_topic("housing").await.unwrap();
    assert_eq!(corpus[0].uri, "at://p/1");
    assert_eq!(corpus[1].uri, "at://p/2");
}

#[tokio::test]
async fn topics_merge_independently() {
    let (_dir, store) = setup("s1").await;
    let log = SessionLog::new(&store, "s1");
    log.append(&[
        post("at://p/1", "housing", 10),
        post("at://p/2", "food insecurity", 11),
        post("at://p/3", "food insecurity", 12),
    ])
    .await
    .unwrap();

    let report = merge_session(&store, &log).await.unwrap();
    assert_eq!(report.per_topic["housing"], 1);
    assert_eq!(report.per_topic["food insecurity"], 2);
    assert_eq!(report.corpus_total, 3);
    assert_eq!(store.load_topic("housing").await.unwrap().len(), 1);
    assert_eq!(store.load_topic("food insecurity").await.unwrap().len(), 2);
}

#[tokio::test]
async fn csv_mirror_is_refreshed_with_flattened_columns() {
    let (_dir, store) = setup("s1").await;
    let log = SessionLog::new(&store, "s1");
    log.append(&[post("at://p/1", "housing", 10)]).await.unwrap();

    merge_session(&store, &log).await.unwrap();

    let csv = std::fs::read_to_string(store.alltime_csv_path("housing")).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.contains("uri"));
    assert!(header.contains("author_handle"));
    assert!(header.contains("author_influence_score"));
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("at://p/1"));
}

#[tokio::test]
async fn empty_session_log_merges_to_nothing() {
    let (_dir, store) = setup("s1").await;
    let log = SessionLog::new(&store, "s1");
    let report = merge_session(&store, &log).await.unwrap();
    assert_eq!(report.merged, 0);
    assert_eq!(report.corpus_total, 0);
    assert!(report.per_topic.is_empty());
}
