//! Assessment engine: turns a candidate prompt into a validated, grade-normalized
//! [`Assessment`].
//!
//! The raw response is treated as untrusted input. It goes through four
//! steps in order: code-fence stripping, decoding into a declared payload
//! shape, structural validation, and grade normalization. Each step has its
//! own [`EngineError`] variant and nothing is silently defaulted.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::llm::{GenerationOptions, LlmProvider, Message, SharedDebugSink};
use crate::prompt::Prompt;
use crate::utils::{describe_decode_failure, fill_template, strip_code_fences};

use super::error::EngineError;
use super::grading::normalize_grade;
use super::guard::RunGuard;
use super::history::history_for_prompt;
use super::types::{Assessment, Metric, MetricScore, Observation, OptimizationEntry, Suggestion, MAX_SCORE};

/// System prompt for prompt assessment.
const ASSESSMENT_SYSTEM_PROMPT: &str = r#"You are an expert prompt engineer who grades prompts written for large language models.

Judge the prompt strictly against the task it must accomplish and the optimization goal. Use the previous rounds, when present, to tell whether the prompt is improving.

Scoring rules:
- Every numeric field uses a 0-20 scale, inclusive.
- overallGrade is one of F, D, C, B, A, A+ or a number on the same 0-20 scale.
- metrics, strengths, weaknesses and suggestions must each contain at least one item.
- Score every custom metric you are given, plus any general metrics you find relevant.

Output Format:
You MUST respond with ONLY a JSON object in this exact format:
{
  "metrics": [{"name": "<metric>", "value": <0-20>, "reasoning": "<why>"}],
  "strengths": [{"point": "<strength>", "example": "<quote or example>"}],
  "weaknesses": [{"point": "<weakness>", "example": "<quote or example>"}],
  "suggestions": [{"description": "<change>", "expectedImpact": <0-20>, "reasoning": "<why>"}],
  "overallScore": <0-20>,
  "overallGrade": "<F|D|C|B|A|A+>",
  "efficiencyScore": <0-20>,
  "alignmentWithGoal": <0-20>
}

Do not wrap the JSON in markdown code fences and do not include any text outside the JSON object."#;

/// User prompt template for prompt assessment.
const ASSESSMENT_USER_TEMPLATE: &str = r#"Assess the following prompt.

Task Description:
{task}

Prompt (JSON):
{prompt}

Previous Rounds:
{history}

Custom Metrics:
{metrics}

Optimization Goal:
{goal}"#;

/// Read-only run context handed to each assessment.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentContext<'a> {
    pub task_description: &'a str,
    /// Recent rounds, oldest first.
    pub history: &'a [OptimizationEntry],
    pub metrics: &'a [Metric],
    pub goal: &'a str,
}

/// Grades prompts with the configured generator.
pub struct AssessmentEngine {
    llm: Arc<dyn LlmProvider>,
    debug: SharedDebugSink,
    options: GenerationOptions,
}

impl std::fmt::Debug for AssessmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AssessmentEngine {
    pub fn new(llm: Arc<dyn LlmProvider>, debug: SharedDebugSink, options: GenerationOptions) -> Self {
        Self {
            llm,
            debug,
            options,
        }
    }

    /// Assess `prompt` in one generator call.
    ///
    /// Retries are the caller's concern; this makes exactly one attempt.
    pub async fn assess(
        &self,
        prompt: &Prompt,
        ctx: &AssessmentContext<'_>,
        guard: &RunGuard,
    ) -> Result<Assessment, EngineError> {
        let user_prompt = build_prompt(prompt, ctx);
        self.debug.log_prompt(&user_prompt);

        let request = self.options.request(vec![
            Message::system(ASSESSMENT_SYSTEM_PROMPT),
            Message::user(user_prompt),
        ]);

        let response = guard.call(self.llm.generate(request)).await??;
        let content = response.first_content().ok_or(EngineError::EmptyResponse)?;
        self.debug.log_response(content);

        let assessment = parse_assessment(content)?;
        tracing::debug!(
            score = assessment.overall_score,
            grade = %assessment.overall_grade,
            "Prompt assessed"
        );
        Ok(assessment)
    }
}

fn build_prompt(prompt: &Prompt, ctx: &AssessmentContext<'_>) -> String {
    let prompt_json = serde_json::to_string_pretty(prompt).unwrap_or_else(|_| prompt.render());
    let history = history_for_prompt(ctx.history);
    let metrics = if ctx.metrics.is_empty() {
        "none specified".to_string()
    } else {
        ctx.metrics
            .iter()
            .map(|m| {
                if m.description.is_empty() {
                    format!("- {}", m.name)
                } else {
                    format!("- {}: {}", m.name, m.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    fill_template(
        ASSESSMENT_USER_TEMPLATE,
        &[
            ("task", ctx.task_description),
            ("prompt", &prompt_json),
            ("history", &history),
            ("metrics", &metrics),
            ("goal", ctx.goal),
        ],
    )
}

/// Wire shape of an assessment response before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentPayload {
    #[serde(default)]
    metrics: Vec<MetricScore>,
    #[serde(default)]
    strengths: Vec<Observation>,
    #[serde(default)]
    weaknesses: Vec<Observation>,
    #[serde(default)]
    suggestions: Vec<Suggestion>,
    overall_score: f64,
    #[serde(default)]
    overall_grade: Value,
    efficiency_score: f64,
    alignment_with_goal: f64,
}

/// Strip, decode, validate and normalize a raw assessment response.
pub fn parse_assessment(raw: &str) -> Result<Assessment, EngineError> {
    let cleaned = strip_code_fences(raw);

    let payload: AssessmentPayload = serde_json::from_str(cleaned)
        .map_err(|e| EngineError::Malformed(describe_decode_failure(cleaned, &e)))?;

    validate_payload(&payload)?;

    let overall_grade = normalize_grade(&payload.overall_grade).map_err(EngineError::Grade)?;

    Ok(Assessment {
        metrics: payload.metrics,
        strengths: payload.strengths,
        weaknesses: payload.weaknesses,
        suggestions: payload.suggestions,
        overall_score: payload.overall_score,
        overall_grade,
        efficiency_score: payload.efficiency_score,
        alignment_with_goal: payload.alignment_with_goal,
    })
}

fn validate_payload(payload: &AssessmentPayload) -> Result<(), EngineError> {
    for (field, len) in [
        ("metrics", payload.metrics.len()),
        ("strengths", payload.strengths.len()),
        ("weaknesses", payload.weaknesses.len()),
        ("suggestions", payload.suggestions.len()),
    ] {
        if len == 0 {
            return Err(EngineError::Validation(format!("{} must not be empty", field)));
        }
    }

    if let Some(metric) = payload.metrics.iter().find(|m| m.name.trim().is_empty()) {
        return Err(EngineError::Validation(format!(
            "metric with value {} has no name",
            metric.value
        )));
    }

    check_score("overallScore", payload.overall_score)?;
    check_score("efficiencyScore", payload.efficiency_score)?;
    check_score("alignmentWithGoal", payload.alignment_with_goal)?;
    for metric in &payload.metrics {
        check_score(&format!("metric '{}'", metric.name), metric.value)?;
    }
    for suggestion in &payload.suggestions {
        check_score("suggestion expectedImpact", suggestion.expected_impact)?;
    }

    Ok(())
}

pub(crate) fn check_score(field: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && (0.0..=MAX_SCORE).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "{} is {}, expected 0-{}",
            field, value, MAX_SCORE
        )))
    }
}
