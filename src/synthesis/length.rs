//! Length control
//!
//! The document target is a fraction of the source word count; chapters
//! split it by importance (or evenly) and each chapter is generated until it
//! lands between its target and the completion ceiling.

use crate::config::LengthPolicy;
use crate::types::{SynthesisLevel, Theme};

/// Smallest section worth asking for
const MIN_SECTION_WORDS: usize = 50;

/// Words the whole document should have
pub fn total_target(source_words: usize, level: SynthesisLevel) -> usize {
    (source_words as f64 * level.fraction()).round() as usize
}

/// Per-chapter targets, in theme order, clamped to `[min_words, max_words]`;
/// `max_words` wins when the bounds cross
pub fn chapter_targets(
    themes: &[Theme],
    total_target: usize,
    policy: LengthPolicy,
    min_words: usize,
    max_words: usize,
) -> Vec<usize> {
    if themes.is_empty() {
        return Vec::new();
    }

    let importance_sum: f64 = themes.iter().map(|t| t.importance.max(0.0) as f64).sum();
    let equal = total_target as f64 / themes.len() as f64;

    themes
        .iter()
        .map(|theme| {
            let raw = match policy {
                LengthPolicy::Weighted if importance_sum > f64::EPSILON => {
                    total_target as f64 * theme.importance.max(0.0) as f64 / importance_sum
                }
                _ => equal,
            };
            (raw.round() as usize).max(min_words).min(max_words)
        })
        .collect()
}

/// Hard upper bound for a chapter
pub fn ceiling(target: usize, completion_ceiling: f32) -> usize {
    (target as f64 * completion_ceiling as f64).floor() as usize
}

/// Words to request for the next section, spreading what is missing over
/// `sections_left` calls
pub fn section_request(target: usize, written: usize, sections_left: usize) -> usize {
    let missing = target.saturating_sub(written);
    missing.div_ceil(sections_left.max(1)).max(MIN_SECTION_WORDS)
}
