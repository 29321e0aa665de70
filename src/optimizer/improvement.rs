//! Improvement engine: proposes two rewrites of the last assessed prompt and
//! keeps the one with the higher predicted impact.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{GenerationOptions, LlmProvider, Message, SharedDebugSink};
use crate::prompt::Prompt;
use crate::utils::{describe_decode_failure, fill_template, strip_code_fences};

use super::assessment::check_score;
use super::error::EngineError;
use super::guard::RunGuard;
use super::history::history_for_prompt;
use super::types::OptimizationEntry;

/// System prompt for prompt improvement.
const IMPROVEMENT_SYSTEM_PROMPT: &str = r#"You are an expert prompt engineer who rewrites prompts for large language models.

You receive a prompt, its assessment, the recent optimization history, the task and the optimization goal. Produce two independent rewrites:
- incrementalImprovement: targeted fixes for the weaknesses the assessment identified, keeping what works.
- boldRedesign: a structural reimagining of the prompt that may change its approach entirely.

For each rewrite, predict its overall score on a 0-20 scale in expectedImpact.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{
  "incrementalImprovement": {
    "input": "<rewritten prompt text>",
    "directives": ["<behavioral constraint>"],
    "examples": ["<few-shot example>"],
    "output": "<expected output shape, optional>",
    "reasoning": "<why this helps>"
  },
  "boldRedesign": {
    "input": "<rewritten prompt text>",
    "directives": ["<behavioral constraint>"],
    "examples": ["<few-shot example>"],
    "output": "<expected output shape, optional>",
    "reasoning": "<why this helps>"
  },
  "expectedImpact": {"incremental": <0-20>, "bold": <0-20>}
}

Do not wrap the JSON in markdown code fences and do not include any text outside the JSON object."#;

/// User prompt template for prompt improvement.
const IMPROVEMENT_USER_TEMPLATE: &str = r#"Improve the following prompt.

Task Description:
{task}

Current Prompt (JSON):
{prompt}

Assessment of the Current Prompt (JSON):
{assessment}

Recent Rounds:
{history}

Optimization Goal:
{goal}"#;

/// Read-only run context handed to each improvement.
#[derive(Debug, Clone, Copy)]
pub struct ImprovementContext<'a> {
    pub task_description: &'a str,
    /// Recent rounds, oldest first. A trailing copy of the entry being
    /// improved is skipped when rendering.
    pub history: &'a [OptimizationEntry],
    pub goal: &'a str,
}

/// Which rewrite strategy produced a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Incremental,
    Bold,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Incremental => write!(f, "incremental"),
            Variant::Bold => write!(f, "bold"),
        }
    }
}

/// The selected rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct Improvement {
    pub prompt: Prompt,
    pub variant: Variant,
    pub expected_impact: f64,
    pub reasoning: String,
}

/// Pick the variant with the strictly higher predicted impact; ties stay incremental.
pub fn select_variant(incremental: f64, bold: f64) -> Variant {
    if bold > incremental {
        Variant::Bold
    } else {
        Variant::Incremental
    }
}

/// Rewrites prompts with the configured generator.
pub struct ImprovementEngine {
    llm: Arc<dyn LlmProvider>,
    debug: SharedDebugSink,
    options: GenerationOptions,
}

impl fmt::Debug for ImprovementEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImprovementEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ImprovementEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, debug: SharedDebugSink, options: GenerationOptions) -> Self {
        Self {
            llm,
            debug,
            options,
        }
    }

    /// Produce a replacement for `previous.prompt` in one generator call.
    pub async fn improve(
        &self,
        previous: &OptimizationEntry,
        ctx: &ImprovementContext<'_>,
        guard: &RunGuard,
    ) -> Result<Improvement, EngineError> {
        let user_prompt = build_prompt(previous, ctx);
        self.debug.log_prompt(&user_prompt);

        let request = self.options.request(vec![
            Message::system(IMPROVEMENT_SYSTEM_PROMPT),
            Message::user(user_prompt),
        ]);

        let response = guard.call(self.llm.generate(request)).await??;
        let content = response.first_content().ok_or(EngineError::EmptyResponse)?;
        self.debug.log_response(content);

        let improvement = parse_improvement(content, &previous.prompt)?;
        tracing::debug!(
            variant = %improvement.variant,
            expected_impact = improvement.expected_impact,
            "Prompt rewritten"
        );
        Ok(improvement)
    }
}

fn build_prompt(previous: &OptimizationEntry, ctx: &ImprovementContext<'_>) -> String {
    let prompt_json =
        serde_json::to_string_pretty(&previous.prompt).unwrap_or_else(|_| previous.prompt.render());
    let assessment_json = serde_json::to_string_pretty(&previous.assessment).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialize assessment");
        String::from("unavailable")
    });
    let earlier = match ctx.history.split_last() {
        Some((last, rest)) if last == previous => rest,
        _ => ctx.history,
    };
    let history = history_for_prompt(earlier);

    fill_template(
        IMPROVEMENT_USER_TEMPLATE,
        &[
            ("task", ctx.task_description),
            ("prompt", &prompt_json),
            ("assessment", &assessment_json),
            ("history", &history),
            ("goal", ctx.goal),
        ],
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImprovementPayload {
    incremental_improvement: Option<VariantPayload>,
    bold_redesign: Option<VariantPayload>,
    expected_impact: Option<ImpactPayload>,
}

#[derive(Debug, Deserialize)]
struct VariantPayload {
    #[serde(default)]
    input: String,
    #[serde(default)]
    directives: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct ImpactPayload {
    incremental: Option<f64>,
    bold: Option<f64>,
}

impl VariantPayload {
    /// Convert into a prompt, inheriting output shape and context from `previous`.
    fn into_prompt(self, previous: &Prompt) -> (Prompt, String) {
        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        let prompt = Prompt {
            input: self.input,
            directives: self.directives,
            examples: self.examples,
            output: non_blank(self.output).or_else(|| previous.output.clone()),
            context: non_blank(self.context).or_else(|| previous.context.clone()),
        };
        (prompt, self.reasoning)
    }
}

/// Strip, decode and validate a raw improvement response, then select a variant.
pub fn parse_improvement(raw: &str, previous: &Prompt) -> Result<Improvement, EngineError> {
    let cleaned = strip_code_fences(raw);

    let payload: ImprovementPayload = serde_json::from_str(cleaned)
        .map_err(|e| EngineError::Malformed(describe_decode_failure(cleaned, &e)))?;

    let incremental = payload
        .incremental_improvement
        .ok_or_else(|| EngineError::MissingVariant("incrementalImprovement".to_string()))?;
    let bold = payload
        .bold_redesign
        .ok_or_else(|| EngineError::MissingVariant("boldRedesign".to_string()))?;
    let impact = payload
        .expected_impact
        .ok_or_else(|| EngineError::MissingVariant("expectedImpact".to_string()))?;
    let incremental_impact = impact
        .incremental
        .ok_or_else(|| EngineError::MissingVariant("expectedImpact.incremental".to_string()))?;
    let bold_impact = impact
        .bold
        .ok_or_else(|| EngineError::MissingVariant("expectedImpact.bold".to_string()))?;

    check_score("expectedImpact.incremental", incremental_impact)?;
    check_score("expectedImpact.bold", bold_impact)?;
    for (name, variant) in [("incrementalImprovement", &incremental), ("boldRedesign", &bold)] {
        if variant.input.trim().is_empty() {
            return Err(EngineError::Validation(format!("{}.input is empty", name)));
        }
    }

    let variant = select_variant(incremental_impact, bold_impact);
    let (chosen, expected_impact) = match variant {
        Variant::Incremental => (incremental, incremental_impact),
        Variant::Bold => (bold, bold_impact),
    };
    let (prompt, reasoning) = chosen.into_prompt(previous);

    Ok(Improvement {
        prompt,
        variant,
        expected_impact,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::NoopDebugSink;
    use crate::optimizer::grading::LetterGrade;
    use crate::optimizer::testing::{improvement_json, ScriptedProvider};
    use crate::optimizer::types::fixtures;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    fn previous() -> Prompt {
        Prompt::new("Write a mystery opening")
            .with_output("Two paragraphs")
            .with_context("Victorian London")
    }

    #[test]
    fn test_select_variant() {
        assert_eq!(select_variant(12.0, 15.0), Variant::Bold);
        assert_eq!(select_variant(15.0, 12.0), Variant::Incremental);
        assert_eq!(select_variant(14.0, 14.0), Variant::Incremental);
    }

    #[test]
    fn test_tie_selects_incremental() {
        let raw = improvement_json("incremental text", "bold text", 16.0, 16.0);
        let improvement = parse_improvement(&raw, &previous()).expect("should parse");
        assert_eq!(improvement.variant, Variant::Incremental);
        assert_eq!(improvement.prompt.input, "incremental text");
        assert_eq!(improvement.reasoning, "Targets the weakness");
    }

    #[test]
    fn test_higher_bold_wins() {
        let raw = format!("```json\n{}\n```", improvement_json("inc", "bold", 13.0, 17.5));
        let improvement = parse_improvement(&raw, &previous()).expect("should parse");
        assert_eq!(improvement.variant, Variant::Bold);
        assert_eq!(improvement.expected_impact, 17.5);
        assert_eq!(improvement.prompt.directives, vec!["Start over".to_string()]);
        assert_eq!(improvement.prompt.examples, vec!["An example".to_string()]);
    }

    #[test]
    fn test_inherits_output_and_context() {
        let raw = improvement_json("inc", "bold", 15.0, 10.0);
        let improvement = parse_improvement(&raw, &previous()).expect("should parse");
        assert_eq!(improvement.prompt.output.as_deref(), Some("Two paragraphs"));
        assert_eq!(improvement.prompt.context.as_deref(), Some("Victorian London"));
    }

    #[test]
    fn test_missing_variant() {
        let mut json: Value =
            serde_json::from_str(&improvement_json("inc", "bold", 1.0, 2.0)).expect("fixture");
        json.as_object_mut().expect("object").remove("boldRedesign");
        match parse_improvement(&json.to_string(), &previous()) {
            Err(EngineError::MissingVariant(name)) => assert_eq!(name, "boldRedesign"),
            other => panic!("expected missing variant, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_impact() {
        let mut json: Value =
            serde_json::from_str(&improvement_json("inc", "bold", 1.0, 2.0)).expect("fixture");
        json["expectedImpact"] = json!({"incremental": 3});
        assert!(matches!(
            parse_improvement(&json.to_string(), &previous()),
            Err(EngineError::MissingVariant(_))
        ));
    }

    #[test]
    fn test_invalid_variants() {
        let raw = improvement_json("inc", "bold", 25.0, 2.0);
        assert!(matches!(
            parse_improvement(&raw, &previous()),
            Err(EngineError::Validation(_))
        ));

        let raw = improvement_json("  ", "bold", 5.0, 2.0);
        assert!(matches!(
            parse_improvement(&raw, &previous()),
            Err(EngineError::Validation(_))
        ));

        assert!(matches!(
            parse_improvement("Here is a better prompt: ...", &previous()),
            Err(EngineError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_improve_embeds_assessment() {
        let provider = Arc::new(ScriptedProvider::texts([improvement_json(
            "A rainy night in Whitechapel...",
            "bold",
            15.0,
            11.0,
        )]));
        let engine = ImprovementEngine::new(
            provider.clone(),
            Arc::new(NoopDebugSink),
            GenerationOptions::default(),
        );
        let earlier = OptimizationEntry::new(
            1,
            Prompt::new("Write a spooky story"),
            fixtures::assessment(8.0, LetterGrade::D),
        );
        let entry = OptimizationEntry::new(2, previous(), fixtures::assessment(11.0, LetterGrade::C));
        let history = [earlier, entry.clone()];
        let ctx = ImprovementContext {
            task_description: "Mystery novel opening",
            history: &history,
            goal: "More atmosphere",
        };
        let guard = RunGuard::unbounded(CancellationToken::new());

        let improvement = engine.improve(&entry, &ctx, &guard).await.expect("should improve");
        assert_eq!(improvement.prompt.input, "A rainy night in Whitechapel...");

        let requests = provider.requests();
        let user = requests[0].user_text().expect("user message");
        assert!(user.contains("Name the audience"));
        assert!(user.contains("Mystery novel opening"));
        assert!(user.contains("\"round\": 1"));
        assert!(user.contains("Write a spooky story"));
        assert!(!user.contains("\"round\": 2"));
        assert_eq!(user.matches("Write a mystery opening").count(), 1);
        assert_eq!(requests[0].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_first_round_has_no_history() {
        let provider = Arc::new(ScriptedProvider::texts([improvement_json("inc", "bold", 15.0, 11.0)]));
        let engine = ImprovementEngine::new(
            provider.clone(),
            Arc::new(NoopDebugSink),
            GenerationOptions::default(),
        );
        let entry = OptimizationEntry::new(1, previous(), fixtures::assessment(11.0, LetterGrade::C));
        let history = [entry.clone()];
        let ctx = ImprovementContext {
            task_description: "Mystery novel opening",
            history: &history,
            goal: "More atmosphere",
        };
        let guard = RunGuard::unbounded(CancellationToken::new());

        engine.improve(&entry, &ctx, &guard).await.expect("should improve");

        let user = provider.requests()[0].user_text().expect("user message").to_string();
        assert!(user.contains("No previous rounds."));
        assert_eq!(user.matches("Write a mystery opening").count(), 1);
    }
}
