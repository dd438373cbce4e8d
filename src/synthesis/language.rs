//! Corpus language detection
//!
//! Scores each candidate by stop-word hits over a fragment sample. The
//! winner must reach a minimum score, otherwise the fallback applies.

use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::config::{LanguageConfig, LanguageSetting};
use crate::types::{EmbeddedFragment, Language};

const ENGLISH: &[&str] = &[
    "the", "and", "of", "to", "in", "is", "that", "it", "for", "was", "on", "are", "as", "with",
    "by", "this", "be", "at", "from", "or", "an", "have", "has", "which", "not", "but", "were",
    "their", "they", "these", "been", "its", "also", "can", "more", "than", "into", "other",
    "such", "there", "would", "a", "we", "our", "between", "when", "who", "what", "how",
];

const GERMAN: &[&str] = &[
    "der", "die", "das", "und", "ist", "nicht", "mit", "den", "von", "zu", "ein", "eine", "auf",
    "für", "sich", "des", "dem", "im", "auch", "werden", "wird", "sind", "bei", "nach", "oder",
    "aus", "wie", "wurde", "einer", "durch", "zum", "zur", "noch", "kann", "nur", "über", "diese",
    "dieser", "haben", "hat", "wenn", "aber", "sie", "es", "wir", "als", "einem", "einen",
];

const FRENCH: &[&str] = &[
    "le", "la", "les", "et", "est", "des", "une", "un", "du", "dans", "pour", "que", "qui", "pas",
    "sur", "au", "aux", "avec", "ce", "cette", "sont", "par", "plus", "ne", "se", "ses", "leur",
    "leurs", "mais", "ou", "été", "être", "fait", "comme", "nous", "vous", "ils", "elle", "entre",
    "aussi", "dont", "sans", "peut", "tout", "très", "l", "d", "qu",
];

const SPANISH: &[&str] = &[
    "el", "la", "los", "las", "y", "que", "en", "del", "es", "por", "con", "una", "un", "para",
    "se", "no", "su", "sus", "al", "lo", "como", "más", "pero", "fue", "son", "entre", "ha", "han",
    "este", "esta", "estos", "sobre", "también", "muy", "sin", "desde", "hay", "ser", "era",
    "cuando", "donde", "porque", "puede", "todo", "nos", "ya", "otros",
];

const ITALIAN: &[&str] = &[
    "il", "lo", "gli", "e", "di", "che", "è", "per", "non", "una", "un", "della", "delle", "dei",
    "degli", "nel", "nella", "con", "sono", "anche", "come", "più", "ma", "alla", "al", "si",
    "questo", "questa", "tra", "fra", "del", "da", "dal", "ha", "hanno", "essere", "stato", "sul",
    "sulla", "loro", "quando", "dove", "perché", "può", "tutto", "ancora", "molto", "ed", "le",
];

static STOP_WORDS: LazyLock<[HashSet<&'static str>; 5]> = LazyLock::new(|| {
    [ENGLISH, GERMAN, FRENCH, SPANISH, ITALIAN].map(|words| words.iter().copied().collect())
});

fn index(language: Language) -> usize {
    match language {
        Language::English => 0,
        Language::German => 1,
        Language::French => 2,
        Language::Spanish => 3,
        Language::Italian => 4,
    }
}

/// Stop-word set for `language`
pub fn stop_words(language: Language) -> &'static HashSet<&'static str> {
    &STOP_WORDS[index(language)]
}

/// Lowercased word tokens; apostrophes and punctuation split words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Per-language stop-word hit counts for `text`, in `Language::ALL` order
pub fn score(text: &str) -> [usize; 5] {
    let mut scores = [0usize; 5];
    for token in tokenize(text) {
        for (i, set) in STOP_WORDS.iter().enumerate() {
            if set.contains(token.as_str()) {
                scores[i] += 1;
            }
        }
    }
    scores
}

/// Outcome of a detection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub language: Language,
    /// Hit counts per candidate, in `Language::ALL` order
    pub scores: [usize; 5],
    /// False when the fallback was used
    pub detected: bool,
}

/// Stop-word based language detector
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    sample_size: usize,
    min_score: usize,
    fallback: Language,
}

impl LanguageDetector {
    pub fn new(config: &LanguageConfig) -> Self {
        Self {
            sample_size: config.sample_size,
            min_score: config.min_score,
            fallback: config.fallback,
        }
    }

    /// Detect from the first `sample_size` fragments
    pub fn detect(&self, fragments: &[EmbeddedFragment]) -> Detection {
        let mut scores = [0usize; 5];
        for ef in fragments.iter().take(self.sample_size) {
            for (total, hits) in scores.iter_mut().zip(score(&ef.fragment.text)) {
                *total += hits;
            }
        }

        // Strictly greater keeps the earlier candidate on ties
        let mut best = 0;
        for i in 1..scores.len() {
            if scores[i] > scores[best] {
                best = i;
            }
        }

        let detection = if scores[best] >= self.min_score {
            Detection {
                language: Language::ALL[best],
                scores,
                detected: true,
            }
        } else {
            Detection {
                language: self.fallback,
                scores,
                detected: false,
            }
        };

        debug!(scores = ?detection.scores, language = %detection.language, detected = detection.detected, "Language scores");
        detection
    }

    /// Apply an explicit override, or detect
    pub fn resolve(&self, setting: LanguageSetting, fragments: &[EmbeddedFragment]) -> Detection {
        match setting {
            LanguageSetting::Fixed(language) => {
                info!(language = %language, "Using configured output language");
                Detection {
                    language,
                    scores: [0; 5],
                    detected: false,
                }
            }
            LanguageSetting::Auto => {
                let detection = self.detect(fragments);
                info!(
                    language = %detection.language,
                    detected = detection.detected,
                    "Resolved output language"
                );
                detection
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fragment;

    fn frags(texts: &[&str]) -> Vec<EmbeddedFragment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| EmbeddedFragment::new(Fragment::new(i.to_string(), "d", 1, *t), vec![1.0]))
            .collect()
    }

    fn detector() -> LanguageDetector {
        LanguageDetector::new(&LanguageConfig::default())
    }

    #[test]
    fn test_detect_english() {
        let sample = frags(&[
            "The results of the study show that the soil is richer in the north.",
            "This is consistent with the data that was collected by the team.",
        ]);
        let detection = detector().detect(&sample);
        assert_eq!(detection.language, Language::English);
        assert!(detection.detected);
    }

    #[test]
    fn test_detect_german() {
        let sample = frags(&[
            "Die Ergebnisse der Studie zeigen, dass der Boden im Norden reicher ist.",
            "Das ist auch mit den Daten vereinbar, die von dem Team erhoben wurden.",
        ]);
        assert_eq!(detector().detect(&sample).language, Language::German);
    }

    #[test]
    fn test_detect_french_with_elision() {
        let sample = frags(&[
            "Les résultats de l'étude montrent que le sol est plus riche dans le nord.",
            "C'est aussi cohérent avec les données qui ont été recueillies par l'équipe.",
        ]);
        assert_eq!(detector().detect(&sample).language, Language::French);
    }

    #[test]
    fn test_fallback_below_min_score() {
        let config = LanguageConfig {
            fallback: Language::Italian,
            ..Default::default()
        };
        let detection = LanguageDetector::new(&config).detect(&frags(&["Xylophone quartz."]));
        assert_eq!(detection.language, Language::Italian);
        assert!(!detection.detected);
    }

    #[test]
    fn test_tie_keeps_candidate_order() {
        let config = LanguageConfig {
            min_score: 1,
            ..Default::default()
        };
        // "con" is Spanish and Italian; Spanish comes first
        let detection = LanguageDetector::new(&config).detect(&frags(&["con"]));
        assert_eq!(detection.language, Language::Spanish);
    }

    #[test]
    fn test_sample_size_limits_input() {
        let config = LanguageConfig {
            sample_size: 1,
            min_score: 1,
            ..Default::default()
        };
        let sample = frags(&["xyz qqq", "the and of the and of"]);
        assert!(!LanguageDetector::new(&config).detect(&sample).detected);
    }

    #[test]
    fn test_override_bypasses_detection() {
        let sample = frags(&["The and of the and of the and of"]);
        let resolved = detector().resolve(LanguageSetting::Fixed(Language::German), &sample);
        assert_eq!(resolved.language, Language::German);
        assert!(!resolved.detected);
    }
}
