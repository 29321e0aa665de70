//! The prompt being optimized.
//!
//! A [`Prompt`] is an instruction plus optional directives (behavioral
//! constraints), few-shot examples, context and an explicit output-shape
//! description. Values are never edited once assessed; improvements
//! produce a new `Prompt`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::llm::{GenerationOptions, GenerationRequest, Message};

/// Instruction text plus structured directives and examples.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// The main instruction.
    pub input: String,
    /// Behavioral constraints for the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<String>,
    /// Few-shot demonstrations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    /// Description of the expected output shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Background information prepended to the instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Prompt {
    /// Create a prompt with only an instruction.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Append directives.
    pub fn with_directives<I, S>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directives.extend(directives.into_iter().map(Into::into));
        self
    }

    /// Append examples.
    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples.extend(examples.into_iter().map(Into::into));
        self
    }

    /// Set the output-shape description.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set background context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Render the full text sent to the generator.
    ///
    /// Sections appear in a fixed order: directives, context, instruction,
    /// examples, output shape. Empty sections are omitted.
    pub fn render(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.directives.is_empty() {
            let lines: Vec<String> = self.directives.iter().map(|d| format!("- {}", d)).collect();
            sections.push(format!("Directives:\n{}", lines.join("\n")));
        }

        if let Some(context) = self.context.as_deref().filter(|c| !c.trim().is_empty()) {
            sections.push(format!("Context: {}", context));
        }

        sections.push(self.input.clone());

        if !self.examples.is_empty() {
            let lines: Vec<String> = self.examples.iter().map(|e| format!("- {}", e)).collect();
            sections.push(format!("Examples:\n{}", lines.join("\n")));
        }

        if let Some(output) = self.output.as_deref().filter(|o| !o.trim().is_empty()) {
            sections.push(format!("Expected output format: {}", output));
        }

        sections.join("\n\n")
    }

    /// Build a generation request whose user message is the rendered prompt.
    pub fn to_request(&self, system: Option<&str>, options: &GenerationOptions) -> GenerationRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(self.render()));
        options.request(messages)
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_instruction_only() {
        let prompt = Prompt::new("Summarize the article.");
        assert_eq!(prompt.render(), "Summarize the article.");
    }

    #[test]
    fn test_render_section_order() {
        let prompt = Prompt::new("Write an opening paragraph.")
            .with_directives(["Use sensory detail", "Keep it under 120 words"])
            .with_examples(["The fog rolled in at dusk."])
            .with_output("A single paragraph")
            .with_context("Small coastal town");

        let rendered = prompt.render();
        let directives = rendered.find("Directives:").expect("directives");
        let context = rendered.find("Context:").expect("context");
        let input = rendered.find("Write an opening").expect("input");
        let examples = rendered.find("Examples:").expect("examples");
        let output = rendered.find("Expected output format").expect("output");

        assert!(directives < context);
        assert!(context < input);
        assert!(input < examples);
        assert!(examples < output);
        assert!(rendered.contains("- Keep it under 120 words"));
    }

    #[test]
    fn test_serde_uses_camel_case_and_defaults() {
        let json = r#"{"input":"Do the thing","directives":["Be brief"]}"#;
        let prompt: Prompt = serde_json::from_str(json).expect("should parse");
        assert_eq!(prompt.directives, vec!["Be brief".to_string()]);
        assert!(prompt.examples.is_empty());
        assert!(prompt.output.is_none());

        let back = serde_json::to_string(&prompt).expect("should serialize");
        assert!(!back.contains("examples"));
    }

    #[test]
    fn test_to_request_includes_system_message() {
        let prompt = Prompt::new("Hello");
        let request = prompt.to_request(Some("Be terse."), &GenerationOptions::default());

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.user_text(), Some("Hello"));
    }
}
