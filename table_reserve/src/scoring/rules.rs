//! Occasion keyword to table feature rules.

use crate::table::Table;

/// One rule: when the occasion mentions `keyword`, tables carrying any of
/// `features` are a good match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccasionRule {
    pub keyword: &'static str,
    pub features: &'static [&'static str],
}

/// Built-in rule table. Keywords are matched case-insensitively against
/// whole words of the occasion text.
pub const DEFAULT_OCCASION_RULES: &[OccasionRule] = &[
    OccasionRule {
        keyword: "romantic",
        features: &["intimate", "romantic", "quiet", "window-view"],
    },
    OccasionRule {
        keyword: "anniversary",
        features: &["intimate", "romantic", "quiet", "window-view"],
    },
    OccasionRule {
        keyword: "date",
        features: &["intimate", "romantic", "quiet"],
    },
    OccasionRule {
        keyword: "proposal",
        features: &["intimate", "romantic", "window-view"],
    },
    OccasionRule {
        keyword: "business",
        features: &["business-friendly", "quiet", "power-outlet"],
    },
    OccasionRule {
        keyword: "meeting",
        features: &["business-friendly", "quiet"],
    },
    OccasionRule {
        keyword: "birthday",
        features: &["celebration", "spacious", "family-friendly"],
    },
    OccasionRule {
        keyword: "celebration",
        features: &["celebration", "spacious"],
    },
    OccasionRule {
        keyword: "family",
        features: &["family-friendly", "spacious", "accessible"],
    },
];

/// Rule set used by the scorer
#[derive(Debug, Clone, Copy)]
pub struct OccasionRules<'a> {
    rules: &'a [OccasionRule],
}

impl Default for OccasionRules<'static> {
    fn default() -> Self {
        Self {
            rules: DEFAULT_OCCASION_RULES,
        }
    }
}

impl<'a> OccasionRules<'a> {
    /// Use a custom rule table
    pub fn new(rules: &'a [OccasionRule]) -> Self {
        Self { rules }
    }

    /// Feature tags wanted by an occasion, sorted and deduplicated.
    /// Empty when no rule matches.
    pub fn wanted_features(&self, occasion: &str) -> Vec<&'a str> {
        let words: Vec<String> = occasion
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut wanted: Vec<&'a str> = self
            .rules
            .iter()
            .filter(|rule| words.iter().any(|w| w == rule.keyword))
            .flat_map(|rule| rule.features.iter().copied())
            .collect();

        wanted.sort_unstable();
        wanted.dedup();
        wanted
    }

    /// Table features that align with the occasion, in sorted order
    pub fn matching_features<'t>(&self, table: &'t Table, occasion: &str) -> Vec<&'t str> {
        let wanted = self.wanted_features(occasion);
        table
            .features
            .iter()
            .map(String::as_str)
            .filter(|f| wanted.contains(f))
            .collect()
    }
}
