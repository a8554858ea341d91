//! Merge a session log into the durable corpus.
//!
//! The merge is idempotent: uris already present in a topic's corpus are
//! dropped, and duplicates inside the corpus itself (from earlier partial
//! runs) collapse to the first occurrence. Touched topic files are rewritten
//! in full, sorted oldest first, together with their CSV mirrors.

use std::collections::{BTreeMap, HashSet};

use skygather_core::Post;

use crate::error::CorpusError;
use crate::export::write_csv;
use crate::session_log::SessionLog;
use crate::store::CorpusStore;

#[derive(Debug, Default)]
pub struct MergeReport {
    /// New posts added to the corpus.
    pub merged: u64,
    /// Session posts dropped because the corpus already had their uri.
    pub duplicates: u64,
    pub per_topic: BTreeMap<String, u64>,
    /// Total posts across the touched topics after the merge.
    pub corpus_total: u64,
}

pub async fn merge_session(
    store: &CorpusStore,
    log: &SessionLog,
) -> Result<MergeReport, CorpusError> {
    let mut by_topic: BTreeMap<String, Vec<Post>> = BTreeMap::new();
    for post in log.read_all().await? {
        by_topic.entry(post.topic.clone()).or_default().push(post);
    }

    let mut report = MergeReport::default();
    for (topic, incoming) in by_topic {
        let existing = store.load_topic(&topic).await?;
        let before = existing.len();

        let mut seen: HashSet<String> = HashSet::with_capacity(before + incoming.len());
        let mut corpus: Vec<Post> = Vec::with_capacity(before + incoming.len());
        for post in existing {
            if seen.insert(post.uri.clone()) {
                corpus.push(post);
            }
        }
        let deduped_existing = before - corpus.len();

        let mut added = 0u64;
        for post in incoming {
            if seen.insert(post.uri.clone()) {
                corpus.push(post);
                added += 1;
            } else {
                report.duplicates += 1;
            }
        }

        let already_sorted = corpus.windows(2).all(|w| w[0].created_at <= w[1].created_at);
        if added > 0 || deduped_existing > 0 || !already_sorted {
            corpus.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            store.write_topic(&topic, &corpus).await?;
            write_csv(&store.alltime_csv_path(&topic), &corpus).await?;
        }

        tracing::info!(
            topic,
            added,
            duplicates = report.duplicates,
            total = corpus.len(),
            "merged session posts"
        );
        report.merged += added;
        report.corpus_total += corpus.len() as u64;
        report.per_topic.insert(topic, added);
    }
    Ok(report)
}

#[cfg(test)]
#[path = "merge_test.rs"]
mod tests;
