//! Filesystem layout and primitive reads/writes for the corpus.
//!
//! ```text
//! {root}/alltime/{slug}_alltime.jsonl    durable per-topic corpus, sorted
//! {root}/alltime/{slug}_alltime.csv      flattened mirror of the above
//! {root}/sessions/{name}/{slug}_posts.jsonl   raw session log, append only
//! {root}/sessions/{name}/session_summary.json
//! ```
//!
//! Corpus rewrites go through a temp file in the same directory followed by
//! a rename, so a crash mid-write leaves the previous corpus intact.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use skygather_core::session::SessionSummary;
use skygather_core::{topic_slug, Post};

use crate::error::CorpusError;

const ALLTIME_SUFFIX: &str = "_alltime.jsonl";

pub struct CorpusStore {
    root: PathBuf,
}

impl CorpusStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn alltime_dir(&self) -> PathBuf {
        self.root.join("alltime")
    }

    #[must_use]
    pub fn session_dir(&self, session: &str) -> PathBuf {
        self.root.join("sessions").join(session)
    }

    #[must_use]
    pub fn alltime_jsonl_path(&self, topic: &str) -> PathBuf {
        self.alltime_dir()
            .join(format!("{}{ALLTIME_SUFFIX}", topic_slug(topic)))
    }

    #[must_use]
    pub fn alltime_csv_path(&self, topic: &str) -> PathBuf {
        self.alltime_dir()
            .join(format!("{}_alltime.csv", topic_slug(topic)))
    }

    pub async fn ensure_layout(&self, session: &str) -> Result<(), CorpusError> {
        for dir in [self.alltime_dir(), self.session_dir(session)] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| CorpusError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Load a topic's corpus. A missing file is an empty corpus; malformed
    /// lines are skipped with a warning so one bad record cannot wedge the
    /// merge.
    pub async fn load_topic(&self, topic: &str) -> Result<Vec<Post>, CorpusError> {
        let path = self.alltime_jsonl_path(topic);
        read_jsonl(&path).await
    }

    /// Every uri already in the durable corpus, across all topics. Seeds the
    /// collector's duplicate tracking at session start.
    pub async fn load_seen_uris(&self) -> Result<HashSet<String>, CorpusError> {
        #[derive(Deserialize)]
        struct UriOnly {
            uri: String,
        }

        let dir = self.alltime_dir();
        let mut seen = HashSet::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(seen),
            Err(e) => return Err(CorpusError::io(&dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CorpusError::io(&dir, e))?
        {
            let path = entry.path();
            if !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ALLTIME_SUFFIX))
            {
                continue;
            }
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CorpusError::io(&path, e))?;
            for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                if let Ok(UriOnly { uri }) = serde_json::from_str::<UriOnly>(line) {
                    seen.insert(uri);
                }
            }
        }
        Ok(seen)
    }

    /// Atomically replace a topic's corpus file with `posts`, in order.
    pub async fn write_topic(&self, topic: &str, posts: &[Post]) -> Result<(), CorpusError> {
        let mut buf = String::new();
        for post in posts {
            buf.push_str(&serde_json::to_string(post)?);
            buf.push('\n');
        }
        write_atomic(&self.alltime_jsonl_path(topic), buf.as_bytes()).await
    }

    pub async fn write_summary(
        &self,
        session: &str,
        summary: &SessionSummary,
    ) -> Result<(), CorpusError> {
        let path = self.session_dir(session).join("session_summary.json");
        let body = serde_json::to_vec_pretty(summary)?;
        write_atomic(&path, &body).await
    }
}

/// Read a JSONL file of posts, skipping lines that fail to parse.
pub(crate) async fn read_jsonl(path: &Path) -> Result<Vec<Post>, CorpusError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CorpusError::io(path, e)),
    };
    let mut posts = Vec::new();
    let mut skipped = 0usize;
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<Post>(line) {
            Ok(post) => posts.push(post),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped malformed corpus lines");
    }
    Ok(posts)
}

/// Write via a temp file in the target directory, then rename into place.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CorpusError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("corpus");
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| CorpusError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| CorpusError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
#[path = "store_test.rs"]
pub(crate) mod tests;
