use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use strsim::jaro_winkler;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref CAMEL_BOUNDARY: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
    static ref CUSTOM_SUFFIX: Regex = Regex::new(r"(?i)__(c|r|pc)$").unwrap();
}

/// Tokens that carry no meaning on their own in CO column names and
/// Salesforce API names.
const NOISE_TOKENS: &[&str] = &["co", "c", "id", "code", "cd"];

/// Fuzzy matcher for identifiers (column / field names) and picklist values
pub struct FuzzyMatcher {
    /// Similarity threshold (0.0-1.0) for considering two strings as matches
    pub similarity_threshold: f64,
    /// Whether to normalize strings before comparison
    pub normalize: bool,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            normalize: true,
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            normalize: true,
        }
    }

    /// Normalize free text for comparison
    /// - Lowercases
    /// - Removes punctuation
    /// - Collapses whitespace
    pub fn normalize_string(&self, s: &str) -> String {
        if !self.normalize {
            return s.to_lowercase();
        }

        let stripped: String = s
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();

        WHITESPACE.replace_all(&stripped, " ").trim().to_string()
    }

    /// Normalize an identifier such as `GIVEN_NAMES`, `BillingPostalCode` or
    /// `Trading_Name__c` into space separated lower-case words.
    pub fn normalize_identifier(&self, s: &str) -> String {
        let without_suffix = CUSTOM_SUFFIX.replace(s.trim(), "");
        let split_camel = CAMEL_BOUNDARY.replace_all(&without_suffix, "$1 $2");
        let spaced = split_camel.replace('_', " ");
        let normalized = self.normalize_string(&spaced);

        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        let meaningful: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !NOISE_TOKENS.contains(t))
            .collect();

        // Keep noise tokens when they are all there is ("ID", "CODE").
        if meaningful.is_empty() {
            tokens.join(" ")
        } else {
            meaningful.join(" ")
        }
    }

    /// Calculate similarity between two strings
    /// Returns a score between 0.0 and 1.0 (higher = more similar)
    pub fn similarity(&self, s1: &str, s2: &str) -> f64 {
        let norm1 = self.normalize_string(s1);
        let norm2 = self.normalize_string(s2);
        Self::score_normalized(&norm1, &norm2)
    }

    /// Similarity of two identifiers: the better of Jaro-Winkler and token overlap.
    pub fn identifier_similarity(&self, a: &str, b: &str) -> f64 {
        let norm_a = self.normalize_identifier(a);
        let norm_b = self.normalize_identifier(b);
        if norm_a.is_empty() || norm_b.is_empty() {
            return 0.0;
        }
        let jw = Self::score_normalized(&norm_a, &norm_b);
        let compact = jaro_winkler(&norm_a.replace(' ', ""), &norm_b.replace(' ', ""));
        jw.max(compact).max(token_jaccard(&norm_a, &norm_b))
    }

    fn score_normalized(norm1: &str, norm2: &str) -> f64 {
        let jw_score = jaro_winkler(norm1, norm2);

        // Substring bonus, e.g. "postcode" inside "billing postcode"
        let is_substring = norm1.contains(norm2) || norm2.contains(norm1);
        let substring_bonus = if is_substring && !norm1.is_empty() && !norm2.is_empty() {
            let len_diff = (norm1.len() as f64 - norm2.len() as f64).abs();
            let max_len = norm1.len().max(norm2.len()) as f64;
            (1.0 - (len_diff / max_len)) * 0.1
        } else {
            0.0
        };

        (jw_score + substring_bonus).min(1.0)
    }

    /// Check if two strings are similar enough to be considered a match
    pub fn is_match(&self, s1: &str, s2: &str) -> bool {
        self.similarity(s1, s2) >= self.similarity_threshold
    }

    /// Find the best matching candidate at or above the threshold
    /// Returns (candidate, similarity_score) if a match is found
    pub fn find_best_match<'a>(&self, target: &str, candidates: &'a [String]) -> Option<(&'a str, f64)> {
        let mut best_match: Option<(&'a str, f64)> = None;

        for candidate in candidates {
            let score = self.similarity(target, candidate);
            if score < self.similarity_threshold {
                continue;
            }
            if best_match.map_or(true, |(_, best)| score > best) {
                best_match = Some((candidate.as_str(), score));
            }
        }

        best_match
    }
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let tokens_b: HashSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return 0.0;
    }
    tokens_a.intersection(&tokens_b).count() as f64 / union as f64
}
