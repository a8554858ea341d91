//! Topic catalog: the fixed set of subjects the collector cares about.
//!
//! Each topic carries an ordered list of regex patterns used by the
//! relevance filter and a list of search-query variants (quoted phrases and
//! hashtags) used by the paginated crawler. Topics are tried in catalog
//! order: it is a priority ranking, not cosmetic.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One named topic with its filter patterns and search-query variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    /// Regex patterns (matched case-insensitively). A topic with no
    /// patterns falls back to substring containment of its own name.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Query strings sent to the search endpoint, tried in order.
    #[serde(default)]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCatalog {
    pub topics: Vec<TopicSpec>,
}

impl TopicCatalog {
    /// Topic names in priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.name.as_str())
    }

    /// Load a catalog from a YAML file and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails
    /// validation (empty catalog, blank or duplicate topic names).
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::TopicsFileIo {
            path: path.display().to_string(),
            source: e,
        })?;
        let catalog: TopicCatalog = serde_yaml::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.topics.is_empty() {
            return Err(ConfigError::InvalidTopic {
                name: "<catalog>".to_string(),
                reason: "catalog contains no topics".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.name.trim().is_empty() {
                return Err(ConfigError::InvalidTopic {
                    name: topic.name.clone(),
                    reason: "topic name is blank".to_string(),
                });
            }
            if !seen.insert(topic.name.as_str()) {
                return Err(ConfigError::InvalidTopic {
                    name: topic.name.clone(),
                    reason: "duplicate topic name".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for TopicCatalog {
    /// The built-in social-justice catalog: five topics in priority order.
    fn default() -> Self {
        let topic = |name: &str, patterns: &[&str], queries: &[&str]| TopicSpec {
            name: name.to_string(),
            patterns: patterns.iter().map(|s| (*s).to_string()).collect(),
            queries: queries.iter().map(|s| (*s).to_string()).collect(),
        };

        TopicCatalog {
            topics: vec![
                topic(
                    "food insecurity",
                    &[
                        r"\bfood\s*insecurit(y|ies)\b",
                        r"\bhungry\b",
                        r"\bhunger\b",
                        r"\bstarv(ing|ation)\b",
                        r"\bfood\s*bank\b",
                        r"\bSNAP\b",
                        r"\bEBT\b",
                    ],
                    &[
                        "\"food insecurity\"",
                        "\"food insecure\"",
                        "#foodinsecurity",
                        "\"hunger crisis\"",
                        "\"food desert\"",
                        "\"SNAP benefits\"",
                        "\"food bank\"",
                        "\"food pantry\"",
                    ],
                ),
                topic(
                    "housing",
                    &[
                        r"\bhousing\s*crisis\b",
                        r"\baffordable\s*housing\b",
                        r"\brent\s*crisis\b",
                        r"\bhousing\s*shortage\b",
                        r"\beviction\b",
                        r"\blandlord\b",
                        r"\btenant\b",
                    ],
                    &[
                        "\"housing crisis\"",
                        "\"affordable housing\"",
                        "#housingcrisis",
                        "\"rent crisis\"",
                        "\"housing shortage\"",
                        "\"eviction\"",
                        "\"gentrification\"",
                    ],
                ),
                topic(
                    "homeless",
                    &[
                        r"\bhomeless(ness)?\b",
                        r"\bunhous(ed|ing)\b",
                        r"\bshelter\b",
                        r"\brough\s*sleep",
                        r"\bstreet.*sleep",
                        r"\bencampment\b",
                    ],
                    &[
                        "\"homeless\"",
                        "\"homelessness\"",
                        "#homeless",
                        "\"unhoused\"",
                        "\"rough sleeping\"",
                        "\"encampment\"",
                        "\"housing first\"",
                    ],
                ),
                topic(
                    "unemployment",
                    &[
                        r"\bunemploy(ed|ment)\b",
                        r"\bjob\s*loss\b",
                        r"\bjobless\b",
                        r"\blayoffs?\b",
                        r"\blaid\s*off\b",
                        r"\bfired\b",
                        r"\bunemployment\s*benefits?\b",
                    ],
                    &[
                        "\"unemployment\"",
                        "\"unemployed\"",
                        "#unemployment",
                        "\"job loss\"",
                        "\"layoffs\"",
                        "\"laid off\"",
                    ],
                ),
                topic(
                    "gender inequality",
                    &[
                        r"\bgender\s*inequalit(y|ies)\b",
                        r"\bgender\s*gap\b",
                        r"\bpay\s*gap\b",
                        r"\bwage\s*gap\b",
                        r"\bgender\s*discrimination\b",
                        r"\bequal\s*pay\b",
                    ],
                    &[
                        "\"gender inequality\"",
                        "\"gender gap\"",
                        "#gendergap",
                        "\"pay gap\"",
                        "\"wage gap\"",
                        "\"equal pay\"",
                    ],
                ),
            ],
        }
    }
}

/// File-name-safe slug for a topic: spaces and hyphens become underscores.
#[must_use]
pub fn topic_slug(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

#[cfg(test)]
#[path = "topics_test.rs"]
mod tests;
