//! Shared text helpers for word accounting and prompt assembly.
//!
//! Word counts drive the length-control loop, so every component counts
//! words the same way: whitespace-separated tokens.

use std::fmt::Display;

// =============================================================================
// Word Accounting
// =============================================================================

/// Count whitespace-separated words.
#[inline]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Byte spans `(start, end)` of each word in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (idx, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, idx));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Last `n` words of `text`, joined by single spaces.
pub fn tail_words(text: &str, n: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let skip = words.len().saturating_sub(n);
    words[skip..].join(" ")
}

/// Whether a word closes a sentence (`.`, `!`, `?`, ignoring closing quotes).
fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '»', '”', '’']);
    trimmed.ends_with(['.', '!', '?'])
}

/// Trim `text` to at most `max_words` words, keeping at least `min_words`.
///
/// Prefers the last sentence boundary inside the budget that keeps both
/// `min_words` and half the budget; falls back to a word boundary at
/// `max_words` when no such sentence end exists.
pub fn trim_to_word_budget(text: &str, min_words: usize, max_words: usize) -> String {
    let spans = word_spans(text);
    if spans.len() <= max_words {
        return text.to_string();
    }
    if max_words == 0 {
        return String::new();
    }

    let min_keep = max_words.div_ceil(2).max(min_words).min(max_words);
    let sentence_end = (min_keep.saturating_sub(1)..max_words)
        .rev()
        .find(|&i| ends_sentence(&text[spans[i].0..spans[i].1]));

    let cut = match sentence_end {
        Some(i) => spans[i].1,
        None => spans[max_words - 1].1,
    };
    text[..cut].trim_end().to_string()
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// =============================================================================
// Logging Helpers
// =============================================================================

/// Filter a Result, logging the error at warn level before discarding.
///
/// Use this instead of `.ok()` when the failure is tolerated but should
/// stay visible.
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("  one two\nthree\t four  "), 4);
    }

    #[test]
    fn test_tail_words() {
        assert_eq!(tail_words("a b c d e", 2), "d e");
        assert_eq!(tail_words("a b", 10), "a b");
        assert_eq!(tail_words("", 3), "");
    }

    #[test]
    fn test_trim_prefers_sentence_boundary() {
        let text = "One two three. Four five six. Seven eight nine ten";
        let trimmed = trim_to_word_budget(text, 0, 8);
        assert_eq!(trimmed, "One two three. Four five six.");
        assert!(count_words(&trimmed) <= 8);
    }

    #[test]
    fn test_trim_falls_back_to_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta";
        assert_eq!(trim_to_word_budget(text, 0, 4), "alpha beta gamma delta");
    }

    #[test]
    fn test_trim_ignores_early_sentence_end() {
        // The only sentence end sits in the first half of the budget
        let text = "Short. a b c d e f g h i j";
        assert_eq!(count_words(&trim_to_word_budget(text, 0, 8)), 8);
    }

    #[test]
    fn test_trim_keeps_minimum() {
        // A sentence end at word 3 would leave less than the required 7 words
        let text = "One two three. four five six seven eight nine ten";
        assert_eq!(trim_to_word_budget(text, 0, 6), "One two three.");
        assert_eq!(trim_to_word_budget(text, 7, 8), "One two three. four five six seven eight");

        let text = "One two three. four five six seven. eight nine ten";
        assert_eq!(trim_to_word_budget(text, 7, 9), "One two three. four five six seven.");
    }

    #[test]
    fn test_trim_within_budget_is_identity() {
        let text = "Nothing to trim here.";
        assert_eq!(trim_to_word_budget(text, 0, 10), text);
    }

    #[test]
    fn test_trim_handles_closing_quotes() {
        let text = "He said \"stop.\" Then more words follow here";
        assert_eq!(trim_to_word_budget(text, 0, 5), "He said \"stop.\"");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("größer", 3), "grö");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
