//! Flattened CSV mirror of a topic corpus for spreadsheet and notebook use.
//!
//! The nested author snapshot flattens to `author_`-prefixed columns and
//! entity lists join with `|`.

use std::path::Path;

use serde::Serialize;
use skygather_core::Post;

use crate::error::CorpusError;
use crate::store::write_atomic;

#[derive(Serialize)]
struct CsvRow<'a> {
    uri: &'a str,
    cid: &'a str,
    created_at: String,
    indexed_at: &'a str,
    text: &'a str,
    lang: &'a str,
    topic: &'a str,
    method: String,
    search_query: &'a str,
    session_name: &'a str,
    collected_at: String,
    reply_count: u64,
    repost_count: u64,
    like_count: u64,
    word_count: usize,
    char_count: usize,
    hashtag_count: usize,
    mention_count: usize,
    url_count: usize,
    hashtags: String,
    mentions: String,
    urls: String,
    has_images: bool,
    has_external_link: bool,
    has_media: bool,
    emotion_score: u32,
    is_reply: bool,
    author_did: &'a str,
    author_handle: &'a str,
    author_display_name: &'a str,
    author_followers_count: u64,
    author_following_count: u64,
    author_posts_count: u64,
    author_verified: bool,
    author_account_age_days: i64,
    author_posts_per_day: f64,
    author_follower_following_ratio: f64,
    author_influence_score: f64,
}

impl<'a> CsvRow<'a> {
    fn from_post(post: &'a Post) -> Self {
        Self {
            uri: &post.uri,
            cid: &post.cid,
            created_at: post.created_at.to_rfc3339(),
            indexed_at: &post.indexed_at,
            text: &post.text,
            lang: &post.lang,
            topic: &post.topic,
            method: post.method.to_string(),
            search_query: post.search_query.as_deref().unwrap_or(""),
            session_name: &post.session_name,
            collected_at: post.collected_at.to_rfc3339(),
            reply_count: post.reply_count,
            repost_count: post.repost_count,
            like_count: post.like_count,
            word_count: post.features.word_count,
            char_count: post.features.char_count,
            hashtag_count: post.features.hashtag_count,
            mention_count: post.features.mention_count,
            url_count: post.features.url_count,
            hashtags: post.features.hashtags.join("|"),
            mentions: post.features.mentions.join("|"),
            urls: post.features.urls.join("|"),
            has_images: post.features.has_images,
            has_external_link: post.features.has_external_link,
            has_media: post.features.has_media,
            emotion_score: post.features.emotion_score,
            is_reply: post.features.is_reply,
            author_did: &post.author.did,
            author_handle: &post.author.handle,
            author_display_name: &post.author.display_name,
            author_followers_count: post.author.followers_count,
            author_following_count: post.author.following_count,
            author_posts_count: post.author.posts_count,
            author_verified: post.author.verified,
            author_account_age_days: post.author.account_age_days,
            author_posts_per_day: post.author.posts_per_day,
            author_follower_following_ratio: post.author.follower_following_ratio,
            author_influence_score: post.author.influence_score,
        }
    }
}

/// Atomically (re)write the CSV mirror for one topic.
pub async fn write_csv(path: &Path, posts: &[Post]) -> Result<(), CorpusError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for post in posts {
        writer.serialize(CsvRow::from_post(post))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CorpusError::io(path, std::io::Error::other(e)))?;
    write_atomic(path, &bytes).await
}
