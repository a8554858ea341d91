//! Bluesky XRPC response types for the endpoints the collector consumes.
//!
//! ## Observed shape notes
//!
//! ### `app.bsky.feed.searchPosts`
//! Returns `{ "posts": [...], "cursor": "..." }`. The `cursor` field is
//! absent on the last page (not `null`). Each post's `record` is the raw
//! repo record; we keep it as a `serde_json::Value` and decode it with
//! [`PostRecordView`] so the same decoding path serves both ingestion modes.
//!
//! ### `app.bsky.actor.getProfile`
//! Count fields (`followersCount`, `followsCount`, `postsCount`) may be
//! absent for brand-new accounts; all default to zero. `createdAt` is an
//! RFC 3339 string; older accounts predate the field, so it is optional.
//! There is no structured verification flag in the public lexicon; when a
//! `verified` boolean is present we take it, otherwise it defaults to
//! `false`.
//!
//! ### Repo records
//! A post record carries `$type == "app.bsky.feed.post"`, `text`,
//! `createdAt`, optional `langs` (first entry wins, default `"en"`), an
//! optional `embed` whose `$type` distinguishes image from external-link
//! embeds, and an optional `reply` ref.

use serde::Deserialize;

/// Tokens returned by `com.atproto.server.createSession`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt", default)]
    pub refresh_jwt: String,
    pub did: String,
    pub handle: String,
}

/// One page from `app.bsky.feed.searchPosts`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub posts: Vec<SearchPost>,
    /// Resume token for the next page; absent on the last page.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// A post view from the search endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchPost {
    pub uri: String,
    #[serde(default)]
    pub cid: String,
    pub author: SearchAuthor,
    /// Raw repo record; decode with [`PostRecordView`].
    pub record: serde_json::Value,
    #[serde(rename = "indexedAt", default)]
    pub indexed_at: String,
    #[serde(rename = "replyCount", default)]
    pub reply_count: u64,
    #[serde(rename = "repostCount", default)]
    pub repost_count: u64,
    #[serde(rename = "likeCount", default)]
    pub like_count: u64,
}

/// The author block embedded in a search hit.
#[derive(Debug, Deserialize)]
pub struct SearchAuthor {
    pub did: String,
    pub handle: String,
}

/// Response from `app.bsky.actor.getProfile`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "followersCount", default)]
    pub followers_count: u64,
    #[serde(rename = "followsCount", default)]
    pub follows_count: u64,
    #[serde(rename = "postsCount", default)]
    pub posts_count: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

/// Decoded `app.bsky.feed.post` repo record.
#[derive(Debug, Deserialize)]
pub struct PostRecordView {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(default)]
    pub langs: Vec<String>,
    #[serde(default)]
    pub embed: Option<EmbedView>,
    #[serde(default)]
    pub reply: Option<serde_json::Value>,
}

impl PostRecordView {
    /// First language tag, defaulting to English.
    #[must_use]
    pub fn primary_lang(&self) -> String {
        self.langs
            .first()
            .cloned()
            .unwrap_or_else(|| "en".to_string())
    }
}

/// Embed block of a post record; only the `$type` matters to us.
#[derive(Debug, Deserialize)]
pub struct EmbedView {
    #[serde(rename = "$type", default)]
    pub kind: String,
}

pub const EMBED_IMAGES: &str = "app.bsky.embed.images";
pub const EMBED_EXTERNAL: &str = "app.bsky.embed.external";

/// Repo record collection prefix that identifies a post.
pub const POST_PATH_PREFIX: &str = "app.bsky.feed.post/";
