//! End-to-end optimization runs through the public API with a scripted provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prompt_forge::llm::{GenerationRequest, GenerationResponse, LlmProvider, NoopDebugSink};
use prompt_forge::optimizer::{
    EngineError, OptimizerConfig, PromptOptimizer, RatingSystem, RunPhase, StopReason,
};
use prompt_forge::{LlmError, Prompt};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Replies in order; a `None` reply simulates a dropped connection.
struct ScriptedLlm {
    replies: Mutex<VecDeque<Option<String>>>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Option<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().expect("lock")
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        *self.calls.lock().expect("lock") += 1;
        match self.replies.lock().expect("lock").pop_front() {
            Some(Some(text)) => Ok(GenerationResponse::from_text("scripted", text)),
            Some(None) => Err(LlmError::RequestFailed("connection reset by peer".into())),
            None => Err(LlmError::ApiError {
                code: 400,
                message: "script exhausted".into(),
            }),
        }
    }
}

fn assessment(score: f64, grade: &str) -> Option<String> {
    Some(
        json!({
            "metrics": [
                {"name": "Atmosphere", "value": score, "reasoning": "Setting is sketched"},
                {"name": "Intrigue", "value": score, "reasoning": "A question is raised"}
            ],
            "strengths": [{"point": "Clear ask", "example": "Write a mystery opening"}],
            "weaknesses": [{"point": "No setting", "example": "Place is never named"}],
            "suggestions": [{"description": "Name a setting", "expectedImpact": 15, "reasoning": "Grounds the mood"}],
            "overallScore": score,
            "overallGrade": grade,
            "efficiencyScore": 16,
            "alignmentWithGoal": score
        })
        .to_string(),
    )
}

fn improvement(incremental: &str, bold: &str, inc: f64, bold_impact: f64) -> Option<String> {
    Some(format!(
        "```json\n{}\n```",
        json!({
            "incrementalImprovement": {
                "input": incremental,
                "directives": ["Name the city and the weather"],
                "examples": [],
                "reasoning": "Adds a setting"
            },
            "boldRedesign": {
                "input": bold,
                "directives": ["Open in the middle of the crime"],
                "examples": ["The body was still warm."],
                "reasoning": "Starts with tension"
            },
            "expectedImpact": {"incremental": inc, "bold": bold_impact}
        })
    ))
}

fn base_config() -> OptimizerConfig {
    OptimizerConfig::new("Write the opening paragraph of a mystery novel")
        .with_goal("Maximize atmosphere and intrigue")
        .with_retry_delay(Duration::from_millis(200))
}

fn optimizer(llm: &Arc<ScriptedLlm>, config: OptimizerConfig) -> PromptOptimizer {
    let provider: Arc<dyn LlmProvider> = llm.clone();
    PromptOptimizer::new(provider, config)
        .expect("valid config")
        .with_debug_sink(Arc::new(NoopDebugSink))
}

#[tokio::test(start_paused = true)]
async fn test_numerical_run_recovers_from_outage_and_meets_goal() {
    let llm = ScriptedLlm::new(vec![
        assessment(9.0, "D"),
        None,
        improvement("Fog over Edinburgh...", "The body was warm...", 12.0, 16.0),
        assessment(14.0, "B"),
        improvement("Rain in Soho...", "A scream at midnight...", 17.0, 17.0),
        None,
        None,
        assessment(18.0, "A"),
    ]);
    let config = base_config()
        .with_rating_system(RatingSystem::Numerical)
        .with_threshold(0.85)
        .with_max_retries(2);
    let mut opt = optimizer(&llm, config);

    let report = opt
        .optimize(Prompt::new("Write a mystery opening"), &CancellationToken::new())
        .await
        .expect("run should succeed");

    assert_eq!(report.stop_reason, StopReason::GoalMet);
    assert!(report.goal_met);
    assert_eq!(report.rounds, 3);
    assert_eq!(report.improvements, 2);
    // Round 1 picked bold (16 > 12), round 2 tied and kept incremental.
    assert_eq!(report.prompt.input, "Rain in Soho...");
    assert_eq!(llm.calls(), 8);
    assert!(opt.history().len() <= 2);
}

#[tokio::test]
async fn test_uncapped_goal_runs_to_iteration_cap() {
    let llm = ScriptedLlm::new(vec![
        assessment(12.0, "C"),
        improvement("v2", "v2-bold", 14.0, 10.0),
        assessment(19.5, "A+"),
        improvement("v3", "v3-bold", 14.0, 10.0),
        assessment(15.0, "B"),
    ]);
    let mut opt = optimizer(&llm, base_config().with_max_iterations(2));

    let report = opt
        .optimize(Prompt::new("v1"), &CancellationToken::new())
        .await
        .expect("run should succeed");

    assert_eq!(report.stop_reason, StopReason::IterationCap);
    assert!(!report.goal_met);
    assert_eq!(report.prompt.input, "v2");
    assert_eq!(report.entry.assessment.overall_score, 19.5);
}

#[tokio::test]
async fn test_empty_strengths_fails_scoring() {
    let mut bad: serde_json::Value =
        serde_json::from_str(&assessment(10.0, "C").expect("fixture")).expect("json");
    bad["strengths"] = json!([]);
    let llm = ScriptedLlm::new(vec![Some(bad.to_string())]);
    let mut opt = optimizer(&llm, base_config().with_max_retries(5));

    let err = opt
        .optimize(Prompt::new("x"), &CancellationToken::new())
        .await
        .expect_err("validation must fail the run");

    assert_eq!(err.failed_phase(), Some(RunPhase::Scoring));
    assert_eq!(err.attempts(), 1);
    assert!(matches!(err.engine_error(), Some(EngineError::Validation(_))));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_is_reported_as_deadline() {
    let llm = ScriptedLlm::new(vec![None, None, None, None]);
    let config = base_config()
        .with_max_retries(10)
        .with_retry_delay(Duration::from_secs(5))
        .with_run_timeout(Duration::from_secs(12));
    let mut opt = optimizer(&llm, config);

    let err = opt
        .optimize(Prompt::new("x"), &CancellationToken::new())
        .await
        .expect_err("deadline must stop the run");

    assert!(err.is_deadline_exceeded());
    assert_eq!(err.failed_phase(), Some(RunPhase::Scoring));
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_independent_optimizers_share_provider() {
    let llm = ScriptedLlm::new(vec![assessment(20.0, "A+"), assessment(20.0, "A+")]);
    let config = base_config().with_rating_system(RatingSystem::Letter);

    let mut first = optimizer(&llm, config.clone());
    let mut second = optimizer(&llm, config);
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        first.optimize(Prompt::new("a"), &cancel),
        second.optimize(Prompt::new("b"), &cancel)
    );

    assert_eq!(a.expect("first run").prompt.input, "a");
    assert_eq!(b.expect("second run").prompt.input, "b");
    assert_eq!(llm.calls(), 2);
}
