use serde::{Deserialize, Serialize};

use crate::text::{fold_case, normalize_quotes};

/// Which comparison located a [`TextMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    Exact,
    Normalized,
    CaseInsensitive,
    NormalizedCaseInsensitive,
}

/// Location of a needle inside a haystack, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    pub start: usize,
    pub length: usize,
    pub strategy: MatchStrategy,
}

impl TextMatch {
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Find `needle` in `haystack`, loosening the comparison step by step.
///
/// Tries, in order: exact, quote/dash/space normalized, case-insensitive, and
/// case-insensitive after normalization. Every transformation maps one character
/// to one character, so the returned offsets index the original haystack. An
/// empty needle never matches.
pub fn find_text_match(haystack: &str, needle: &str) -> Option<TextMatch> {
    if needle.is_empty() {
        return None;
    }
    let length = needle.chars().count();
    let located = |start: usize, strategy: MatchStrategy| TextMatch {
        start,
        length,
        strategy,
    };

    if let Some(start) = char_find(haystack, needle) {
        return Some(located(start, MatchStrategy::Exact));
    }

    let normalized_haystack = normalize_quotes(haystack);
    let normalized_needle = normalize_quotes(needle);
    if let Some(start) = char_find(&normalized_haystack, &normalized_needle) {
        return Some(located(start, MatchStrategy::Normalized));
    }

    if let Some(start) = char_find(&fold_case(haystack), &fold_case(needle)) {
        return Some(located(start, MatchStrategy::CaseInsensitive));
    }

    char_find(&fold_case(&normalized_haystack), &fold_case(&normalized_needle))
        .map(|start| located(start, MatchStrategy::NormalizedCaseInsensitive))
}

/// Character offset of the first occurrence of `needle`.
pub(crate) fn char_find(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte_index| haystack[..byte_index].chars().count())
}

/// Character offset of the occurrence of `needle` whose start is closest to
/// `estimate`; earlier occurrences win ties.
pub(crate) fn nearest_occurrence(haystack: &str, needle: &str, estimate: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .match_indices(needle)
        .map(|(byte_index, _)| haystack[..byte_index].chars().count())
        .min_by_key(|&start| start.abs_diff(estimate))
}
