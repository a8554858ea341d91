use skygather_core::{TopicCatalog, TopicSpec};

use super::KeywordFilter;

fn catalog(topics: Vec<(&str, Vec<&str>)>) -> TopicCatalog {
    TopicCatalog {
        topics: topics
            .into_iter()
            .map(|(name, patterns)| TopicSpec {
                name: name.to_string(),
                patterns: patterns.into_iter().map(String::from).collect(),
                queries: vec![],
            })
            .collect(),
    }
}

#[test]
fn matches_pattern_and_reports_topic() {
    // Scenario B from the collection design notes.
    let filter = KeywordFilter::new(&catalog(vec![(
        "housing",
        vec!["housing crisis", "eviction"],
    )]));
    assert_eq!(
        filter.classify("local eviction notices rise"),
        Some("housing")
    );
    assert_eq!(filter.classify("cooking dinner tonight"), None);
}

#[test]
fn matching_is_case_insensitive() {
    let filter = KeywordFilter::new(&catalog(vec![("housing", vec![r"\beviction\b"])]));
    assert_eq!(filter.classify("EVICTION moratorium ends"), Some("housing"));
}

#[test]
fn first_topic_in_priority_order_wins() {
    let filter = KeywordFilter::new(&catalog(vec![
        ("homeless", vec![r"\bshelter\b"]),
        ("housing", vec![r"\bshelter\b"]),
    ]));
    assert_eq!(
        filter.classify("the shelter is at capacity"),
        Some("homeless")
    );
}

#[test]
fn topic_without_patterns_falls_back_to_name_containment() {
    let filter = KeywordFilter::new(&catalog(vec![("unemployment", vec![])]));
    assert_eq!(
        filter.classify("Unemployment claims hit a record"),
        Some("unemployment")
    );
    assert_eq!(filter.classify("employment is up"), None);
}

#[test]
fn invalid_pattern_degrades_to_substring() {
    // "(unclosed" is not a valid regex; the filter must still match it as a
    // literal substring rather than erroring out.
    let filter = KeywordFilter::new(&catalog(vec![("broken", vec!["(unclosed"])]));
    assert_eq!(filter.classify("found an (unclosed paren"), Some("broken"));
    assert_eq!(filter.classify("nothing to see"), None);
}

#[test]
fn classify_is_deterministic() {
    let filter = KeywordFilter::new(&TopicCatalog::default());
    let text = "the housing crisis is hitting renters hard";
    let first = filter.classify(text).map(String::from);
    for _ in 0..10 {
        assert_eq!(filter.classify(text).map(String::from), first);
    }
}

#[test]
fn default_catalog_word_boundaries_hold() {
    let filter = KeywordFilter::new(&TopicCatalog::default());
    // "hungry" matches food insecurity; "hungrying" must not.
    assert_eq!(filter.classify("so hungry tonight"), Some("food insecurity"));
    assert_eq!(filter.classify("hungryish vibes"), None);
    // SNAP with word boundaries.
    assert_eq!(
        filter.classify("cuts to SNAP hit families"),
        Some("food insecurity")
    );
}

#[test]
fn empty_text_matches_nothing() {
    let filter = KeywordFilter::new(&TopicCatalog::default());
    assert_eq!(filter.classify(""), None);
}
