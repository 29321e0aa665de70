//! Structured data extraction from free text.
//!
//! Two generator calls: a yes/no check that the text holds extractable
//! information, then a schema-guided extraction whose response is stripped,
//! decoded into the target type and validated.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::llm::{GenerationOptions, GenerationRequest, LlmProvider};
use crate::optimizer::RunGuard;
use crate::prompt::Prompt;
use crate::utils::{describe_decode_failure, strip_code_fences};

const PRECHECK_DIRECTIVES: [&str; 3] = [
    "Answer only 'yes' or 'no'",
    "Answer 'yes' if the text has enough information to fill most required fields",
    "Answer 'no' if the text is unrelated or lacks the necessary information",
];

const EXTRACTION_DIRECTIVES: [&str; 3] = [
    "Extract all relevant information from the text",
    "Make sure the output matches the provided JSON schema exactly",
    "If a field cannot be filled confidently, leave it null or use an empty string or array",
];

/// A type that can be extracted from text.
///
/// The JSON schema sent to the model is derived from the type, so
/// `#[derive(Deserialize, JsonSchema)]` plus an empty impl is enough.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Checks constraints the schema cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Errors from [`extract_structured_data`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("input text is empty")]
    EmptyInput,

    #[error("text does not contain enough extractable information")]
    NotExtractable,

    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("malformed extraction response: {0}")]
    Malformed(String),

    #[error("extracted data failed validation: {0}")]
    Validation(String),

    #[error("extraction cancelled")]
    Cancelled,
}

/// Options for the extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Generation options for both calls.
    pub generation: GenerationOptions,
    /// Extra directives appended to the extraction prompt.
    pub directives: Vec<String>,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default()
                .with_temperature(0.2)
                .with_max_tokens(500),
            directives: Vec::new(),
        }
    }
}

impl ExtractionOptions {
    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }
}

/// Extract a `T` from unstructured `text`.
pub async fn extract_structured_data<T: StructuredOutput>(
    provider: &dyn LlmProvider,
    text: &str,
    options: &ExtractionOptions,
    cancel: &CancellationToken,
) -> Result<T, ExtractionError> {
    if text.trim().is_empty() {
        return Err(ExtractionError::EmptyInput);
    }
    let guard = RunGuard::unbounded(cancel.clone());

    let precheck = Prompt::new(format!(
        "Does the following text contain enough information to extract structured data?\n\n{}",
        text
    ))
    .with_directives(PRECHECK_DIRECTIVES)
    .with_output("A single word: 'yes' or 'no'");
    let answer = generate_text(provider, precheck.to_request(None, &options.generation), &guard).await?;
    if !is_affirmative(&answer) {
        tracing::debug!(answer = %answer, "Text rejected by extraction pre-check");
        return Err(ExtractionError::NotExtractable);
    }

    let schema = serde_json::to_string_pretty(&schemars::schema_for!(T))
        .map_err(|e| ExtractionError::Malformed(format!("schema is not serializable: {}", e)))?;
    let extraction = Prompt::new(format!(
        "Extract the following information from the given text:\n\n{}\n\nRespond with a JSON object matching this schema:\n{}",
        text, schema
    ))
    .with_directives(
        EXTRACTION_DIRECTIVES
            .iter()
            .map(|d| d.to_string())
            .chain(options.directives.iter().cloned()),
    )
    .with_output("A JSON object matching the provided schema");

    let raw = generate_text(provider, extraction.to_request(None, &options.generation), &guard).await?;
    let cleaned = strip_code_fences(&raw);
    let value: T = serde_json::from_str(cleaned)
        .map_err(|e| ExtractionError::Malformed(describe_decode_failure(cleaned, &e)))?;
    value.validate().map_err(ExtractionError::Validation)?;

    Ok(value)
}

async fn generate_text(
    provider: &dyn LlmProvider,
    request: GenerationRequest,
    guard: &RunGuard,
) -> Result<String, ExtractionError> {
    // An unbounded guard only ever reports cancellation.
    let response = guard
        .call(provider.generate(request))
        .await
        .map_err(|_| ExtractionError::Cancelled)??;

    response
        .first_content()
        .map(str::to_string)
        .ok_or_else(|| ExtractionError::Malformed("empty response".to_string()))
}

fn is_affirmative(answer: &str) -> bool {
    answer
        .trim()
        .trim_end_matches(['.', '!'])
        .eq_ignore_ascii_case("yes")
}
