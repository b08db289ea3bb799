//! Query-term highlighting and score tiers for search results.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Byte range of a highlighted match inside the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Case-insensitive union-of-terms matcher built once per query.
pub struct Highlighter {
    terms: Vec<String>,
    pattern: Option<Regex>,
}

impl Highlighter {
    pub fn new(query: &str) -> Self {
        let mut terms: Vec<String> = Vec::new();
        for term in query.split_whitespace() {
            if !terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                terms.push(term.to_string());
            }
        }

        // Longest first so that overlapping terms prefer the wider match.
        let mut ordered: Vec<&String> = terms.iter().collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = ordered
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = if terms.is_empty() {
            None
        } else {
            RegexBuilder::new(&alternation)
                .case_insensitive(true)
                .build()
                .ok()
        };

        Self { terms, pattern }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Every non-overlapping match of any query term, in text order.
    pub fn spans(&self, text: &str) -> Vec<Span> {
        match &self.pattern {
            Some(re) => re
                .find_iter(text)
                .map(|m| Span {
                    start: m.start(),
                    end: m.end(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Split `text` into `(segment, highlighted)` pairs covering it entirely.
    pub fn segments<'t>(&self, text: &'t str) -> Vec<(&'t str, bool)> {
        split_segments(text, &self.spans(text))
    }
}

pub fn split_segments<'t>(text: &'t str, spans: &[Span]) -> Vec<(&'t str, bool)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            out.push((&text[cursor..span.start], false));
        }
        out.push((&text[span.start..span.end], true));
        cursor = span.end;
    }
    if cursor < text.len() {
        out.push((&text[cursor..], false));
    }
    out
}

/// Display tier of a similarity score. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    /// ≥ 0.9
    Excellent,
    /// ≥ 0.8
    Strong,
    /// ≥ 0.7
    Fair,
    Weak,
}

impl ScoreTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.8 {
            Self::Strong
        } else if score >= 0.7 {
            Self::Fair
        } else {
            Self::Weak
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Excellent => "green",
            Self::Strong => "blue",
            Self::Fair => "yellow",
            Self::Weak => "gray",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "green/≥0.9",
            Self::Strong => "blue/≥0.8",
            Self::Fair => "yellow/≥0.7",
            Self::Weak => "gray/<0.7",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_union() {
        let h = Highlighter::new("redis cluster setup");
        let text = "Redis Cluster SETUP guide: a redis cluster needs setup.";
        let marked: Vec<&str> = h
            .segments(text)
            .into_iter()
            .filter(|(_, hit)| *hit)
            .map(|(s, _)| s)
            .collect();
        assert_eq!(
            marked,
            vec!["Redis", "Cluster", "SETUP", "redis", "cluster", "setup"]
        );
    }

    #[test]
    fn test_substring_matches() {
        let h = Highlighter::new("cache");
        let spans = h.spans("Caches and caching");
        assert_eq!(spans, vec![Span { start: 0, end: 5 }]);
        // "caching" does not contain "cache".
    }

    #[test]
    fn test_segments_cover_text() {
        let h = Highlighter::new("b");
        let text = "abcb";
        let joined: String = h.segments(text).iter().map(|(s, _)| *s).collect();
        assert_eq!(joined, text);
        assert_eq!(h.segments(text), vec![("a", false), ("b", true), ("c", false), ("b", true)]);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let h = Highlighter::new("c++ (beta)");
        let spans = h.spans("Learn C++ today (beta)");
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_blank_query_highlights_nothing() {
        let h = Highlighter::new("   ");
        assert!(h.terms().is_empty());
        assert_eq!(h.segments("text"), vec![("text", false)]);
    }

    #[test]
    fn test_duplicate_terms_collapse() {
        let h = Highlighter::new("Redis redis REDIS");
        assert_eq!(h.terms(), &["Redis".to_string()]);
    }

    #[test]
    fn test_longer_term_wins_overlap() {
        let h = Highlighter::new("index indexing");
        assert_eq!(h.spans("indexing"), vec![Span { start: 0, end: 8 }]);
    }

    #[test]
    fn test_score_tiers() {
        assert_eq!(ScoreTier::from_score(0.92), ScoreTier::Excellent);
        assert_eq!(ScoreTier::from_score(0.9), ScoreTier::Excellent);
        assert_eq!(ScoreTier::from_score(0.81), ScoreTier::Strong);
        assert_eq!(ScoreTier::from_score(0.73), ScoreTier::Fair);
        assert_eq!(ScoreTier::from_score(0.5), ScoreTier::Weak);
        assert_eq!(ScoreTier::Strong.color(), "blue");
    }
}
