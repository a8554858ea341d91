//! Content-feature extraction: counts, entity lists, media flags, and the
//! emotion-keyword score attached to every collected post.

use regex::Regex;
use skygather_core::ContentFeatures;

use crate::types::{PostRecordView, EMBED_EXTERNAL, EMBED_IMAGES};

/// Keywords whose presence bumps the emotion score by one each.
const EMOTION_KEYWORDS: [&str; 8] = [
    "crisis",
    "urgent",
    "help",
    "desperate",
    "struggling",
    "need",
    "support",
    "emergency",
];

/// Compiled entity patterns; build once and reuse for every post.
pub struct FeatureExtractor {
    hashtag: Regex,
    mention: Regex,
    url: Regex,
}

impl FeatureExtractor {
    /// # Panics
    ///
    /// Only if one of the fixed entity patterns fails to compile, which the
    /// unit tests rule out.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hashtag: Regex::new(r"#\w+").unwrap(),
            mention: Regex::new(r"@[\w.-]+").unwrap(),
            url: Regex::new(r"https?://\S+").unwrap(),
        }
    }

    #[must_use]
    pub fn extract(&self, text: &str, record: &PostRecordView) -> ContentFeatures {
        let hashtags: Vec<String> = self
            .hashtag
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        let mentions: Vec<String> = self
            .mention
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        let urls: Vec<String> = self
            .url
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();

        let text_lower = text.to_lowercase();
        #[allow(clippy::cast_possible_truncation)]
        let emotion_score = EMOTION_KEYWORDS
            .iter()
            .filter(|word| text_lower.contains(**word))
            .count() as u32;

        let embed_kind = record.embed.as_ref().map(|e| e.kind.as_str());
        let has_images = embed_kind == Some(EMBED_IMAGES);
        let has_external_link = embed_kind == Some(EMBED_EXTERNAL);

        ContentFeatures {
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            hashtag_count: hashtags.len(),
            mention_count: mentions.len(),
            url_count: urls.len(),
            hashtags,
            mentions,
            urls,
            has_images,
            has_external_link,
            has_media: has_images || has_external_link,
            emotion_score,
            is_reply: record.reply.is_some(),
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "features_test.rs"]
mod tests;
