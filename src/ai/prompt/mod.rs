//! Prompt Builder System
//!
//! Standardized prompt construction for LLM interactions. Headers and
//! instructions are supplied by the caller so the same structure serves
//! every output language.
//!
//! ## Layout
//!
//! 1. **Role**: one-line task framing
//! 2. **Context**: ordered key-value facts
//! 3. **Sources**: numbered excerpts
//! 4. **Rules**: explicit constraints
//! 5. **Text**: free sections (prior text, closing instruction)

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition
    Role(String),
    /// Ordered key-value facts under a header
    Context {
        header: String,
        items: Vec<(String, String)>,
    },
    /// Numbered source excerpts under a header
    Sources { header: String, items: Vec<String> },
    /// Bulleted constraints under a header
    Rules { header: String, items: Vec<String> },
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role definition section
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.sections.push(PromptSection::Role(role.into()));
        self
    }

    /// Add a context item, reusing the existing context section
    pub fn context_item(mut self, header: &str, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        for section in &mut self.sections {
            if let PromptSection::Context { items, .. } = section {
                items.push((key.to_string(), value));
                return self;
            }
        }
        self.sections.push(PromptSection::Context {
            header: header.to_string(),
            items: vec![(key.to_string(), value)],
        });
        self
    }

    /// Add numbered sources
    pub fn sources<I, S>(mut self, header: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.push(PromptSection::Sources {
            header: header.to_string(),
            items: items.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add bulleted rules
    pub fn rules<I, S>(mut self, header: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.push(PromptSection::Rules {
            header: header.to_string(),
            items: items.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add text section
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.into(),
        });
        self
    }

    /// Add text section with header
    pub fn section(mut self, header: &str, content: impl Into<String>) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.into(),
        });
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role(role) => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&role);
                    prompt.push_str("\n</ROLE>\n\n");
                }
                PromptSection::Context { header, items } => {
                    prompt.push_str(&format!("# {}\n\n", header));
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Sources { header, items } => {
                    prompt.push_str(&format!("# {}\n\n", header));
                    for (i, item) in items.iter().enumerate() {
                        prompt.push_str(&format!("[{}] {}\n\n", i + 1, item.trim()));
                    }
                }
                PromptSection::Rules { header, items } => {
                    prompt.push_str(&format!("<{}>\n", header.to_uppercase()));
                    for item in items {
                        prompt.push_str(&format!("- {}\n", item));
                    }
                    prompt.push_str(&format!("</{}>\n\n", header.to_uppercase()));
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("You are an expert technical writer.")
            .rules("Rules", ["Use only the sources", "No bullet lists"])
            .build();

        assert!(prompt.starts_with("<ROLE>"));
        assert!(prompt.contains("<RULES>\n- Use only the sources\n- No bullet lists\n</RULES>"));
    }

    #[test]
    fn test_sources_are_numbered() {
        let prompt = PromptBuilder::new()
            .sources("Sources", ["  first excerpt ", "second excerpt"])
            .build();

        assert!(prompt.contains("[1] first excerpt"));
        assert!(prompt.contains("[2] second excerpt"));
    }

    #[test]
    fn test_context_items_keep_order() {
        let prompt = PromptBuilder::new()
            .context_item("Context", "Chapter", "Soil")
            .context_item("Context", "Target", "900 words")
            .build();

        let chapter = prompt.find("**Chapter**: Soil").unwrap();
        let target = prompt.find("**Target**: 900 words").unwrap();
        assert!(chapter < target);
        assert_eq!(prompt.matches("# Context").count(), 1);
    }

    #[test]
    fn test_text_section_with_header() {
        let prompt = PromptBuilder::new()
            .section("Previous text", "...ended here.")
            .text("Continue.")
            .build();
        assert!(prompt.contains("# Previous text\n\n...ended here.\n\nContinue."));
    }
}
