//! TF-IDF keywords per theme
//!
//! Each theme's member texts form one document; terms frequent in a theme
//! but rare across the other themes rank highest.

use std::collections::{HashMap, HashSet};

use crate::synthesis::language::{stop_words, tokenize};
use crate::types::Language;

const MIN_TERM_CHARS: usize = 3;

fn terms<'a>(text: &'a str, stops: &'a HashSet<&'static str>) -> impl Iterator<Item = String> + 'a {
    tokenize(text).filter(move |t| {
        t.chars().count() >= MIN_TERM_CHARS
            && !stops.contains(t.as_str())
            && !t.chars().all(|c| c.is_numeric())
    })
}

/// Top `count` keywords for each theme, given the member texts per theme
pub fn extract_keywords(themes: &[Vec<&str>], language: Language, count: usize) -> Vec<Vec<String>> {
    if count == 0 {
        return vec![Vec::new(); themes.len()];
    }

    let stops = stop_words(language);

    let term_freqs: Vec<HashMap<String, usize>> = themes
        .iter()
        .map(|texts| {
            let mut tf = HashMap::new();
            for text in texts {
                for term in terms(text, stops) {
                    *tf.entry(term).or_insert(0) += 1;
                }
            }
            tf
        })
        .collect();

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for tf in &term_freqs {
        for term in tf.keys() {
            *doc_freq.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let n_docs = themes.len() as f32;

    term_freqs
        .iter()
        .map(|tf| {
            let total: usize = tf.values().sum();
            if total == 0 {
                return Vec::new();
            }

            let mut scored: Vec<(&str, f32)> = tf
                .iter()
                .map(|(term, &freq)| {
                    let df = doc_freq.get(term.as_str()).copied().unwrap_or(1) as f32;
                    let idf = (n_docs / df).ln() + 1.0;
                    (term.as_str(), freq as f32 / total as f32 * idf)
                })
                .collect();

            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            scored.truncate(count);
            scored.into_iter().map(|(term, _)| term.to_string()).collect()
        })
        .collect()
}
