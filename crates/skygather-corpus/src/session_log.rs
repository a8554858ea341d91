//! Append-only per-session log.
//!
//! Each flush appends to `{slug}_posts.jsonl` inside the session directory.
//! The log is the session's raw record: nothing here is deduplicated against
//! the durable corpus, that happens at merge time.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use skygather_core::{topic_slug, Post};

use crate::error::CorpusError;
use crate::store::{read_jsonl, CorpusStore};

const LOG_SUFFIX: &str = "_posts.jsonl";

pub struct SessionLog {
    dir: PathBuf,
    session: String,
}

impl SessionLog {
    #[must_use]
    pub fn new(store: &CorpusStore, session: &str) -> Self {
        Self {
            dir: store.session_dir(session),
            session: session.to_string(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    fn topic_path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}{LOG_SUFFIX}", topic_slug(topic)))
    }

    /// Append a batch, grouped per topic. Returns the number of lines
    /// written.
    pub async fn append(&self, posts: &[Post]) -> Result<usize, CorpusError> {
        let mut by_topic: BTreeMap<&str, String> = BTreeMap::new();
        for post in posts {
            let buf = by_topic.entry(post.topic.as_str()).or_default();
            buf.push_str(&serde_json::to_string(post)?);
            buf.push('\n');
        }
        for (topic, buf) in &by_topic {
            let path = self.topic_path(topic);
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| CorpusError::io(&path, e))?;
            file.write_all(buf.as_bytes())
                .await
                .map_err(|e| CorpusError::io(&path, e))?;
            file.flush()
                .await
                .map_err(|e| CorpusError::io(&path, e))?;
        }
        Ok(posts.len())
    }

    /// Read the whole session log back, all topics.
    pub async fn read_all(&self) -> Result<Vec<Post>, CorpusError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CorpusError::io(&self.dir, e)),
        };
        let mut posts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CorpusError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(LOG_SUFFIX))
            {
                posts.extend(read_jsonl(&path).await?);
            }
        }
        Ok(posts)
    }
}
