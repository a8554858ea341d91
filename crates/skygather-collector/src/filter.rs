//! Keyword relevance filter.
//!
//! Pure text classifier over the topic catalog. Topics are tried in catalog
//! priority order; the first topic with any matching pattern wins. Patterns
//! that fail to compile degrade to case-insensitive substring containment
//! instead of failing the run, and a topic with no patterns at all falls
//! back to containment of its own name.

use regex::Regex;
use skygather_core::TopicCatalog;

enum Matcher {
    Pattern(Regex),
    /// Lowercased literal, tested against the lowercased text.
    Substring(String),
}

impl Matcher {
    fn matches(&self, text: &str, text_lower: &str) -> bool {
        match self {
            Matcher::Pattern(re) => re.is_match(text),
            Matcher::Substring(needle) => text_lower.contains(needle),
        }
    }
}

struct CompiledTopic {
    name: String,
    name_lower: String,
    matchers: Vec<Matcher>,
}

/// Compiled form of the topic catalog. Build once per run; `classify` is
/// deterministic and side-effect-free.
pub struct KeywordFilter {
    topics: Vec<CompiledTopic>,
}

impl KeywordFilter {
    #[must_use]
    pub fn new(catalog: &TopicCatalog) -> Self {
        let topics = catalog
            .topics
            .iter()
            .map(|spec| {
                let matchers = spec
                    .patterns
                    .iter()
                    .map(|pattern| match Regex::new(&format!("(?i){pattern}")) {
                        Ok(re) => Matcher::Pattern(re),
                        Err(err) => {
                            tracing::warn!(
                                topic = %spec.name,
                                pattern = %pattern,
                                error = %err,
                                "pattern failed to compile, falling back to substring match"
                            );
                            Matcher::Substring(pattern.to_lowercase())
                        }
                    })
                    .collect();
                CompiledTopic {
                    name: spec.name.clone(),
                    name_lower: spec.name.to_lowercase(),
                    matchers,
                }
            })
            .collect();
        Self { topics }
    }

    /// Returns the first topic (in priority order) whose patterns match the
    /// text, or `None` if no topic is relevant.
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<&str> {
        let text_lower = text.to_lowercase();
        for topic in &self.topics {
            let hit = if topic.matchers.is_empty() {
                text_lower.contains(&topic.name_lower)
            } else {
                topic
                    .matchers
                    .iter()
                    .any(|m| m.matches(text, &text_lower))
            };
            if hit {
                return Some(&topic.name);
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
