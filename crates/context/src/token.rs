//! Token estimation, trimming, and budget splitting.
//!
//! Uses a character/whitespace heuristic rather than any model-specific
//! tokenizer: `ceil(chars / 4) + floor(whitespace / 3)`, minimum 1 for
//! non-empty text. The contract is "rarely overshoots", not exact
//! equality, so the subsystem never depends on a particular provider's
//! vocabulary.
//!
//! All functions are pure; trimming threads immutable values through
//! rather than mutating shared state.

use serde::{Deserialize, Serialize};

/// Marker appended (or prepended) to trimmed text.
pub const ELLIPSIS: &str = "...";

/// Estimate the token count for a string.
///
/// `ceil(chars / 4) + floor(whitespace / 3)`, minimum 1 for non-empty text.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let mut chars = 0usize;
    let mut whitespace = 0usize;
    for c in text.chars() {
        chars += 1;
        if c.is_whitespace() {
            whitespace += 1;
        }
    }
    (chars.div_ceil(4) + whitespace / 3).max(1)
}

/// Trim text to fit `max_tokens`, preserving the head.
///
/// Iteratively shrinks the cut point, preferring the last word boundary at
/// or past 80% of the target length, and appends an ellipsis marker when
/// anything was cut. Returns `(text, truncated)`.
pub fn trim_to_limit(text: &str, max_tokens: usize) -> (String, bool) {
    if estimate_tokens(text) <= max_tokens {
        return (text.to_string(), false);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut target = (max_tokens * 4).min(chars.len());

    loop {
        if target == 0 {
            return (ELLIPSIS.to_string(), true);
        }

        let cut = word_boundary_before(&chars, target).unwrap_or(target);
        let mut candidate: String = chars[..cut].iter().collect();
        candidate.truncate(candidate.trim_end().len());
        candidate.push_str(ELLIPSIS);

        if estimate_tokens(&candidate) <= max_tokens {
            return (candidate, true);
        }
        // Shrink by ~10% and retry.
        target = (target * 9 / 10).min(target - 1);
    }
}

/// Trim text to fit `max_tokens`, preserving the tail.
///
/// Mirror of [`trim_to_limit`]: the cut prefers a word boundary within the
/// leading 20% of the kept window, and the ellipsis marker is prepended.
pub fn trim_to_limit_keep_tail(text: &str, max_tokens: usize) -> (String, bool) {
    if estimate_tokens(text) <= max_tokens {
        return (text.to_string(), false);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut target = (max_tokens * 4).min(chars.len());

    loop {
        if target == 0 {
            return (ELLIPSIS.to_string(), true);
        }

        let start = chars.len() - target;
        let cut = word_boundary_after(&chars, start, target).unwrap_or(start);
        let kept: String = chars[cut..].iter().collect();
        let candidate = format!("{ELLIPSIS}{}", kept.trim_start());

        if estimate_tokens(&candidate) <= max_tokens {
            return (candidate, true);
        }
        target = (target * 9 / 10).min(target - 1);
    }
}

/// Last whitespace index in `chars[..target]` at or past 80% of `target`.
fn word_boundary_before(chars: &[char], target: usize) -> Option<usize> {
    let floor = target * 4 / 5;
    (floor..target).rev().find(|&i| chars[i].is_whitespace())
}

/// First whitespace index within the leading 20% of the window starting at
/// `start`; the cut lands just after it.
fn word_boundary_after(chars: &[char], start: usize, window: usize) -> Option<usize> {
    let ceiling = (start + window / 5).min(chars.len());
    (start..ceiling)
        .find(|&i| chars[i].is_whitespace())
        .map(|i| i + 1)
}

/// Trim a list to fit `max_tokens` by dropping items from the oldest end
/// (the front). If the one remaining item alone still exceeds the budget,
/// it is trimmed in place, keeping its head. Returns `(kept, truncated)`.
pub fn trim_list_to_limit(items: &[String], max_tokens: usize) -> (Vec<String>, bool) {
    trim_list(items, max_tokens, trim_to_limit)
}

/// Like [`trim_list_to_limit`], but a lone over-budget survivor keeps its
/// tail — for lists where the newest content sits at the end of each item.
pub fn trim_list_to_limit_keep_tail(items: &[String], max_tokens: usize) -> (Vec<String>, bool) {
    trim_list(items, max_tokens, trim_to_limit_keep_tail)
}

fn trim_list(
    items: &[String],
    max_tokens: usize,
    trim_survivor: fn(&str, usize) -> (String, bool),
) -> (Vec<String>, bool) {
    if items.is_empty() {
        return (Vec::new(), false);
    }

    let total = |xs: &[String]| xs.iter().map(|s| estimate_tokens(s)).sum::<usize>();
    let mut start = 0;
    while start < items.len() - 1 && total(&items[start..]) > max_tokens {
        start += 1;
    }

    let mut kept: Vec<String> = items[start..].to_vec();
    let mut truncated = start > 0;

    if kept.len() == 1 && estimate_tokens(&kept[0]) > max_tokens {
        let (trimmed, _) = trim_survivor(&kept[0], max_tokens);
        kept[0] = trimmed;
        truncated = true;
    }

    (kept, truncated)
}

/// Token allocations for one prompt assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub messages: usize,
    pub embeddings: usize,
    pub plan: usize,
}

/// Optional per-source budget overrides. `None` means "use the default
/// share".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BudgetOverrides {
    pub messages: Option<usize>,
    pub embeddings: Option<usize>,
    pub plan: Option<usize>,
}

/// Split a total budget into per-source allocations.
///
/// Default split: messages 50%, embeddings 35%, plan 15%.
pub fn split_budget(total: usize, overrides: &BudgetOverrides) -> ContextBudget {
    ContextBudget {
        messages: overrides.messages.unwrap_or(total * 50 / 100),
        embeddings: overrides.embeddings.unwrap_or(total * 35 / 100),
        plan: overrides.plan.unwrap_or(total * 15 / 100),
    }
}

/// One source's contribution to the prompt. Discarded after assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextResult {
    /// The rendered block, possibly empty.
    pub formatted: String,
    /// Estimated tokens of `formatted`.
    pub token_count: usize,
    /// Whether anything was dropped or shortened to fit.
    pub truncated: bool,
}

impl ContextResult {
    /// A section contributing nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Measure and wrap a rendered block.
    pub fn measured(formatted: String, truncated: bool) -> Self {
        Self {
            token_count: estimate_tokens(&formatted),
            formatted,
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.formatted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_text_is_at_least_one() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("ab"), 1);
    }

    #[test]
    fn heuristic_counts_chars_and_whitespace() {
        // 11 chars → ceil(11/4) = 3; 2 spaces → 0. Total 3.
        assert_eq!(estimate_tokens("hello big w"), 3);
        // 100 chars no whitespace → 25.
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
        // 9 single-char words: 17 chars → ceil = 5; 8 spaces → +2.
        assert_eq!(estimate_tokens("a b c d e f g h i"), 7);
    }

    #[test]
    fn trim_noop_when_under_budget() {
        let (text, truncated) = trim_to_limit("short text", 100);
        assert_eq!(text, "short text");
        assert!(!truncated);
    }

    #[test]
    fn trim_respects_budget_and_marks() {
        let long = "word ".repeat(200);
        let (text, truncated) = trim_to_limit(&long, 20);
        assert!(truncated);
        assert!(text.ends_with(ELLIPSIS));
        assert!(estimate_tokens(&text) <= 20);
    }

    #[test]
    fn trim_prefers_word_boundary() {
        let long = "alpha beta gamma delta epsilon zeta eta theta iota kappa".repeat(4);
        let (text, _) = trim_to_limit(&long, 10);
        // The char before the marker should not split a word.
        let body = text.trim_end_matches(ELLIPSIS);
        assert!(!body.is_empty());
        assert!(estimate_tokens(&text) <= 10);
    }

    #[test]
    fn trim_keep_tail_preserves_end() {
        let long = format!("{} FINAL", "word ".repeat(200));
        let (text, truncated) = trim_to_limit_keep_tail(&long, 20);
        assert!(truncated);
        assert!(text.starts_with(ELLIPSIS));
        assert!(text.ends_with("FINAL"));
        assert!(estimate_tokens(&text) <= 20);
    }

    #[test]
    fn trim_tiny_budget_degrades_to_marker() {
        let (text, truncated) = trim_to_limit(&"x".repeat(400), 1);
        assert!(truncated);
        assert!(text.ends_with(ELLIPSIS));
        assert!(estimate_tokens(&text) <= 1);
    }

    #[test]
    fn list_trim_drops_oldest_first() {
        let items: Vec<String> = (0..10).map(|i| format!("message number {i} with some content")).collect();
        let budget = estimate_tokens(&items[9]) * 3;
        let (kept, truncated) = trim_list_to_limit(&items, budget);
        assert!(truncated);
        assert!(kept.len() < 10);
        // Newest survives verbatim.
        assert_eq!(kept.last().unwrap(), &items[9]);
    }

    #[test]
    fn list_trim_shrinks_lone_survivor() {
        let items = vec!["tiny".to_string(), "x".repeat(800)];
        let (kept, truncated) = trim_list_to_limit(&items, 10);
        assert!(truncated);
        assert_eq!(kept.len(), 1);
        assert!(estimate_tokens(&kept[0]) <= 10);
    }

    #[test]
    fn list_trim_empty_list() {
        let (kept, truncated) = trim_list_to_limit(&[], 10);
        assert!(kept.is_empty());
        assert!(!truncated);
    }

    #[test]
    fn list_trim_keep_tail_preserves_survivor_end() {
        let items = vec![
            "older entry".to_string(),
            format!("{} FINAL", "word ".repeat(200)),
        ];
        let (kept, truncated) = trim_list_to_limit_keep_tail(&items, 20);
        assert!(truncated);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].ends_with("FINAL"));
        assert!(estimate_tokens(&kept[0]) <= 20);
    }

    #[test]
    fn split_budget_default_shares() {
        let budget = split_budget(1000, &BudgetOverrides::default());
        assert_eq!(budget.messages, 500);
        assert_eq!(budget.embeddings, 350);
        assert_eq!(budget.plan, 150);
    }

    #[test]
    fn split_budget_honors_overrides() {
        let overrides = BudgetOverrides {
            embeddings: Some(100),
            ..Default::default()
        };
        let budget = split_budget(1000, &overrides);
        assert_eq!(budget.messages, 500);
        assert_eq!(budget.embeddings, 100);
        assert_eq!(budget.plan, 150);
    }

    #[test]
    fn measured_result_counts_tokens() {
        let result = ContextResult::measured("some formatted block".into(), false);
        assert_eq!(result.token_count, estimate_tokens("some formatted block"));
        assert!(!result.is_empty());
        assert!(ContextResult::empty().is_empty());
    }
}
