//! Localized prompt templates
//!
//! Each output language owns one `PromptTemplates` set: the label prompt,
//! the section and continuation prompts, the generic label pattern, and the
//! prefixes models like to put in front of a label.

use crate::ai::PromptBuilder;
use crate::types::Language;

/// Prompt text for one language
#[derive(Debug)]
pub struct PromptTemplates {
    pub language: Language,
    /// Generic label; `{n}` is the 1-based theme position
    pub generic_label: &'static str,
    /// Lowercase prefixes stripped from generated labels
    pub label_prefixes: &'static [&'static str],
    pub label_role: &'static str,
    /// `{max_words}` placeholder
    pub label_instruction: &'static str,
    pub writer_role: &'static str,
    pub context_header: &'static str,
    pub sources_header: &'static str,
    pub prior_header: &'static str,
    pub rules_header: &'static str,
    pub document_key: &'static str,
    pub chapter_key: &'static str,
    pub keywords_key: &'static str,
    pub length_key: &'static str,
    /// `{words}` unit label
    pub words_unit: &'static str,
    pub rules: &'static [&'static str],
    /// `{chapter}` and `{words}` placeholders
    pub section_instruction: &'static str,
    /// `{chapter}` and `{words}` placeholders
    pub continuation_instruction: &'static str,
}

static ENGLISH: PromptTemplates = PromptTemplates {
    language: Language::English,
    generic_label: "Theme {n}",
    label_prefixes: &["theme:", "title:", "label:", "topic:", "chapter:"],
    label_role: "You are an editor who names the common topic of a group of text excerpts.",
    label_instruction: "Reply with a short title of at most {max_words} words that names the shared topic of the excerpts. Reply with the title only: no quotes, no punctuation at the end, no explanation.",
    writer_role: "You are an expert writer who synthesizes source material into a coherent, well-structured chapter.",
    context_header: "Context",
    sources_header: "Sources",
    prior_header: "Previous text of this chapter",
    rules_header: "Rules",
    document_key: "Document",
    chapter_key: "Chapter",
    keywords_key: "Key terms",
    length_key: "Length",
    words_unit: "words",
    rules: &[
        "Use only information found in the sources",
        "Write continuous prose in paragraphs, without headings or bullet lists",
        "Do not mention the sources, excerpts or these instructions",
        "Do not repeat the chapter title",
    ],
    section_instruction: "Write a section of the chapter \"{chapter}\" of about {words} words based on the sources above.",
    continuation_instruction: "Continue the chapter \"{chapter}\" with about {words} more words. Pick up where the previous text ends, add new information from the sources and do not repeat what was already said.",
};

static GERMAN: PromptTemplates = PromptTemplates {
    language: Language::German,
    generic_label: "Thema {n}",
    label_prefixes: &["thema:", "titel:", "überschrift:", "kapitel:"],
    label_role: "Du bist ein Lektor, der das gemeinsame Thema einer Gruppe von Textauszügen benennt.",
    label_instruction: "Antworte mit einem kurzen Titel von höchstens {max_words} Wörtern, der das gemeinsame Thema der Auszüge benennt. Antworte nur mit dem Titel: keine Anführungszeichen, kein Satzzeichen am Ende, keine Erklärung.",
    writer_role: "Du bist ein erfahrener Autor, der Quellenmaterial zu einem zusammenhängenden, gut gegliederten Kapitel verdichtet.",
    context_header: "Kontext",
    sources_header: "Quellen",
    prior_header: "Bisheriger Text dieses Kapitels",
    rules_header: "Regeln",
    document_key: "Dokument",
    chapter_key: "Kapitel",
    keywords_key: "Schlüsselbegriffe",
    length_key: "Länge",
    words_unit: "Wörter",
    rules: &[
        "Verwende nur Informationen aus den Quellen",
        "Schreibe fortlaufenden Text in Absätzen, ohne Überschriften oder Aufzählungen",
        "Erwähne weder die Quellen noch die Auszüge noch diese Anweisungen",
        "Wiederhole den Kapiteltitel nicht",
    ],
    section_instruction: "Schreibe auf Grundlage der obigen Quellen einen Abschnitt des Kapitels \"{chapter}\" mit etwa {words} Wörtern.",
    continuation_instruction: "Setze das Kapitel \"{chapter}\" mit etwa {words} weiteren Wörtern fort. Knüpfe an das Ende des bisherigen Textes an, ergänze neue Informationen aus den Quellen und wiederhole nichts.",
};

static FRENCH: PromptTemplates = PromptTemplates {
    language: Language::French,
    generic_label: "Thème {n}",
    label_prefixes: &["thème :", "thème:", "titre :", "titre:", "sujet :", "sujet:", "chapitre :", "chapitre:"],
    label_role: "Vous êtes un éditeur qui nomme le sujet commun d'un groupe d'extraits.",
    label_instruction: "Répondez par un titre court d'au plus {max_words} mots qui nomme le sujet commun des extraits. Répondez uniquement par le titre : sans guillemets, sans ponctuation finale, sans explication.",
    writer_role: "Vous êtes un auteur expérimenté qui synthétise des sources en un chapitre cohérent et bien structuré.",
    context_header: "Contexte",
    sources_header: "Sources",
    prior_header: "Texte précédent de ce chapitre",
    rules_header: "Règles",
    document_key: "Document",
    chapter_key: "Chapitre",
    keywords_key: "Termes clés",
    length_key: "Longueur",
    words_unit: "mots",
    rules: &[
        "Utilisez uniquement les informations présentes dans les sources",
        "Rédigez une prose continue en paragraphes, sans titres ni listes à puces",
        "Ne mentionnez ni les sources, ni les extraits, ni ces consignes",
        "Ne répétez pas le titre du chapitre",
    ],
    section_instruction: "Rédigez une section du chapitre « {chapter} » d'environ {words} mots à partir des sources ci-dessus.",
    continuation_instruction: "Poursuivez le chapitre « {chapter} » avec environ {words} mots supplémentaires. Reprenez là où le texte précédent s'arrête, apportez des informations nouvelles tirées des sources et ne répétez rien.",
};

static SPANISH: PromptTemplates = PromptTemplates {
    language: Language::Spanish,
    generic_label: "Tema {n}",
    label_prefixes: &["tema:", "título:", "titulo:", "capítulo:"],
    label_role: "Eres un editor que nombra el tema común de un grupo de extractos de texto.",
    label_instruction: "Responde con un título breve de como máximo {max_words} palabras que nombre el tema común de los extractos. Responde solo con el título: sin comillas, sin puntuación final, sin explicación.",
    writer_role: "Eres un escritor experto que sintetiza material de origen en un capítulo coherente y bien estructurado.",
    context_header: "Contexto",
    sources_header: "Fuentes",
    prior_header: "Texto anterior de este capítulo",
    rules_header: "Reglas",
    document_key: "Documento",
    chapter_key: "Capítulo",
    keywords_key: "Términos clave",
    length_key: "Extensión",
    words_unit: "palabras",
    rules: &[
        "Usa solo información presente en las fuentes",
        "Escribe prosa continua en párrafos, sin encabezados ni listas",
        "No menciones las fuentes, los extractos ni estas instrucciones",
        "No repitas el título del capítulo",
    ],
    section_instruction: "Escribe una sección del capítulo «{chapter}» de unas {words} palabras a partir de las fuentes anteriores.",
    continuation_instruction: "Continúa el capítulo «{chapter}» con unas {words} palabras más. Retoma donde termina el texto anterior, añade información nueva de las fuentes y no repitas lo ya dicho.",
};

static ITALIAN: PromptTemplates = PromptTemplates {
    language: Language::Italian,
    generic_label: "Tema {n}",
    label_prefixes: &["tema:", "titolo:", "argomento:", "capitolo:"],
    label_role: "Sei un redattore che dà un nome all'argomento comune di un gruppo di estratti.",
    label_instruction: "Rispondi con un titolo breve di al massimo {max_words} parole che nomini l'argomento comune degli estratti. Rispondi solo con il titolo: senza virgolette, senza punteggiatura finale, senza spiegazioni.",
    writer_role: "Sei uno scrittore esperto che sintetizza il materiale di partenza in un capitolo coerente e ben strutturato.",
    context_header: "Contesto",
    sources_header: "Fonti",
    prior_header: "Testo precedente di questo capitolo",
    rules_header: "Regole",
    document_key: "Documento",
    chapter_key: "Capitolo",
    keywords_key: "Termini chiave",
    length_key: "Lunghezza",
    words_unit: "parole",
    rules: &[
        "Usa solo informazioni presenti nelle fonti",
        "Scrivi prosa continua in paragrafi, senza titoli né elenchi puntati",
        "Non menzionare le fonti, gli estratti o queste istruzioni",
        "Non ripetere il titolo del capitolo",
    ],
    section_instruction: "Scrivi una sezione del capitolo «{chapter}» di circa {words} parole basandoti sulle fonti qui sopra.",
    continuation_instruction: "Prosegui il capitolo «{chapter}» con circa {words} parole in più. Riprendi da dove termina il testo precedente, aggiungi informazioni nuove dalle fonti e non ripetere quanto già detto.",
};

/// Template set for `language`
pub fn templates(language: Language) -> &'static PromptTemplates {
    match language {
        Language::English => &ENGLISH,
        Language::German => &GERMAN,
        Language::French => &FRENCH,
        Language::Spanish => &SPANISH,
        Language::Italian => &ITALIAN,
    }
}

/// Inputs for one section prompt
#[derive(Debug, Clone)]
pub struct SectionPrompt<'a> {
    pub document_title: &'a str,
    pub chapter_title: &'a str,
    pub keywords: &'a [String],
    pub sources: Vec<&'a str>,
    /// Tail of the chapter so far; set for continuations
    pub prior_tail: Option<&'a str>,
    pub requested_words: usize,
}

impl PromptTemplates {
    pub fn generic_label(&self, n: usize) -> String {
        self.generic_label.replace("{n}", &n.to_string())
    }

    pub fn label_prompt(&self, excerpts: &[&str], max_words: usize) -> String {
        PromptBuilder::new()
            .role(self.label_role)
            .sources(self.sources_header, excerpts.iter().copied())
            .text(
                self.label_instruction
                    .replace("{max_words}", &max_words.to_string()),
            )
            .build()
    }

    pub fn section_prompt(&self, input: &SectionPrompt<'_>) -> String {
        let length = format!("~{} {}", input.requested_words, self.words_unit);

        let mut builder = PromptBuilder::new()
            .role(self.writer_role)
            .context_item(self.context_header, self.document_key, input.document_title)
            .context_item(self.context_header, self.chapter_key, input.chapter_title);
        if !input.keywords.is_empty() {
            builder = builder.context_item(
                self.context_header,
                self.keywords_key,
                input.keywords.join(", "),
            );
        }
        builder = builder
            .context_item(self.context_header, self.length_key, length)
            .sources(self.sources_header, input.sources.iter().copied())
            .rules(self.rules_header, self.rules.iter().copied());

        let instruction = match input.prior_tail {
            Some(tail) => {
                builder = builder.section(self.prior_header, format!("…{}", tail));
                self.continuation_instruction
            }
            None => self.section_instruction,
        };

        builder
            .text(
                instruction
                    .replace("{chapter}", input.chapter_title)
                    .replace("{words}", &input.requested_words.to_string()),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_labels_localized() {
        assert_eq!(templates(Language::English).generic_label(3), "Theme 3");
        assert_eq!(templates(Language::German).generic_label(1), "Thema 1");
        assert_eq!(templates(Language::French).generic_label(2), "Thème 2");
    }

    #[test]
    fn test_every_language_has_templates() {
        for lang in Language::ALL {
            let t = templates(lang);
            assert_eq!(t.language, lang);
            assert!(t.generic_label.contains("{n}"));
            assert!(t.label_instruction.contains("{max_words}"));
            assert!(t.section_instruction.contains("{words}"));
            assert!(t.continuation_instruction.contains("{chapter}"));
            assert!(t.label_prefixes.iter().all(|p| *p == p.to_lowercase()));
        }
    }

    #[test]
    fn test_label_prompt_numbers_excerpts() {
        let prompt = templates(Language::English).label_prompt(&["alpha text", "beta text"], 8);
        assert!(prompt.contains("[1] alpha text"));
        assert!(prompt.contains("[2] beta text"));
        assert!(prompt.contains("at most 8 words"));
    }

    #[test]
    fn test_section_prompt_first_and_continuation() {
        let t = templates(Language::English);
        let keywords = vec!["soil".to_string(), "nitrogen".to_string()];
        let mut input = SectionPrompt {
            document_title: "Field Report",
            chapter_title: "Soil Health",
            keywords: &keywords,
            sources: vec!["Nitrogen levels rose."],
            prior_tail: None,
            requested_words: 400,
        };

        let first = t.section_prompt(&input);
        assert!(first.contains("**Chapter**: Soil Health"));
        assert!(first.contains("**Key terms**: soil, nitrogen"));
        assert!(first.contains("[1] Nitrogen levels rose."));
        assert!(first.contains("about 400 words"));
        assert!(!first.contains("Previous text"));

        input.prior_tail = Some("and so the plots recovered.");
        let cont = t.section_prompt(&input);
        assert!(cont.contains("# Previous text of this chapter"));
        assert!(cont.contains("…and so the plots recovered."));
        assert!(cont.contains("Continue the chapter \"Soil Health\""));
    }

    #[test]
    fn test_section_prompt_localized() {
        let input = SectionPrompt {
            document_title: "Bericht",
            chapter_title: "Boden",
            keywords: &[],
            sources: vec!["Text"],
            prior_tail: None,
            requested_words: 250,
        };
        let prompt = templates(Language::German).section_prompt(&input);
        assert!(prompt.contains("# Quellen"));
        assert!(prompt.contains("etwa 250 Wörtern"));
    }
}
