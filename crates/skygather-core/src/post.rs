//! The post record stored in the corpus.
//!
//! ## Shape notes
//!
//! `uri` is the globally unique identifier (`at://{did}/{collection}/{rkey}`).
//! The author snapshot is nested in the JSONL representation; the CSV mirror
//! flattens it with an `author_` prefix for downstream reporting tools.
//! Engagement counters (`like_count` etc.) are only populated by the search
//! crawler; the event stream does not carry them, so they default to zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a record entered the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMethod {
    Stream,
    Search,
}

impl std::fmt::Display for CollectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionMethod::Stream => write!(f, "stream"),
            CollectionMethod::Search => write!(f, "search"),
        }
    }
}

/// Features derived from the post text and embed at collection time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentFeatures {
    pub word_count: usize,
    pub char_count: usize,
    pub hashtag_count: usize,
    pub mention_count: usize,
    pub url_count: usize,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub has_images: bool,
    pub has_external_link: bool,
    pub has_media: bool,
    /// Count of emotion-keyword occurrences ("crisis", "urgent", ...).
    pub emotion_score: u32,
    pub is_reply: bool,
}

/// Snapshot of an author profile at collection time, including the derived
/// influence metrics. Denormalized onto every post so the corpus stays
/// self-contained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
    pub verified: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub account_age_days: i64,
    pub posts_per_day: f64,
    pub follower_following_ratio: f64,
    pub influence_score: f64,
    /// Set on the zeroed fallback snapshot when the profile lookup failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

/// One collected post. Immutable once merged into the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub uri: String,
    #[serde(default)]
    pub cid: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_handle: String,
    pub author_did: String,
    /// The matched topic from the relevance filter.
    pub topic: String,
    pub method: CollectionMethod,
    /// The search query that surfaced this post (search method only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    pub session_name: String,
    pub collected_at: DateTime<Utc>,
    pub lang: String,
    pub features: ContentFeatures,
    #[serde(default)]
    pub indexed_at: String,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub like_count: u64,
    pub author: AuthorSnapshot,
}
