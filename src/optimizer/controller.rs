//! Optimization controller: the Scoring → Deciding → Improving loop.
//!
//! Each round scores the current prompt, records it in the history buffer,
//! checks the termination policy and, if the run continues, replaces the
//! current prompt with the selected rewrite. Both generator-backed phases
//! run under a bounded retry that only repeats transient failures.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::llm::{LlmProvider, SharedDebugSink, TracingDebugSink};
use crate::prompt::Prompt;

use super::assessment::{AssessmentContext, AssessmentEngine};
use super::config::OptimizerConfig;
use super::error::{EngineError, OptimizerError, RunPhase};
use super::grading::is_optimization_goal_met;
use super::guard::RunGuard;
use super::history::HistoryBuffer;
use super::improvement::{ImprovementContext, ImprovementEngine};
use super::types::OptimizationEntry;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The latest assessment met the rating system's goal.
    GoalMet,
    /// The improvement budget ran out; the best-scoring prompt was kept.
    IterationCap,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::GoalMet => write!(f, "goal met"),
            StopReason::IterationCap => write!(f, "iteration cap reached"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    /// The optimized prompt.
    pub prompt: Prompt,
    /// The entry `prompt` was taken from, with its assessment.
    pub entry: OptimizationEntry,
    /// Number of scoring rounds performed.
    pub rounds: u32,
    /// Number of rewrites applied.
    pub improvements: u32,
    pub stop_reason: StopReason,
    pub goal_met: bool,
}

impl OptimizationReport {
    fn new(entry: OptimizationEntry, rounds: u32, improvements: u32, stop_reason: StopReason) -> Self {
        Self {
            prompt: entry.prompt.clone(),
            entry,
            rounds,
            improvements,
            stop_reason,
            goal_met: stop_reason == StopReason::GoalMet,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

/// Drives optimization runs for one configuration.
///
/// The optimizer exclusively owns its history buffer, so a single instance
/// runs one optimization at a time (`optimize` takes `&mut self`). Distinct
/// instances may share one provider and run concurrently.
pub struct PromptOptimizer {
    llm: Arc<dyn LlmProvider>,
    config: OptimizerConfig,
    assessor: AssessmentEngine,
    improver: ImprovementEngine,
    history: HistoryBuffer,
}

impl fmt::Debug for PromptOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptOptimizer")
            .field("config", &self.config)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl PromptOptimizer {
    /// Creates an optimizer after validating `config`.
    ///
    /// Raw prompts and responses go to a [`TracingDebugSink`] by default.
    pub fn new(llm: Arc<dyn LlmProvider>, config: OptimizerConfig) -> Result<Self, OptimizerError> {
        config.validate()?;
        let debug: SharedDebugSink = Arc::new(TracingDebugSink::default());
        Ok(Self::build(llm, config, debug))
    }

    /// Replace the debug sink used by both engines.
    pub fn with_debug_sink(self, debug: SharedDebugSink) -> Self {
        Self::build(self.llm, self.config, debug)
    }

    fn build(llm: Arc<dyn LlmProvider>, config: OptimizerConfig, debug: SharedDebugSink) -> Self {
        let assessor = AssessmentEngine::new(
            Arc::clone(&llm),
            Arc::clone(&debug),
            config.assessment_options.clone(),
        );
        let improver =
            ImprovementEngine::new(Arc::clone(&llm), debug, config.improvement_options.clone());
        let history = HistoryBuffer::new(config.history_size);

        Self {
            llm,
            config,
            assessor,
            improver,
            history,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// History of the most recent (or current) run.
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Optimize `initial` until the goal is met or the iteration cap is reached.
    ///
    /// `cancel` aborts the run promptly, including mid-call and mid-wait.
    /// A run never returns a partially validated result.
    pub async fn optimize(
        &mut self,
        initial: Prompt,
        cancel: &CancellationToken,
    ) -> Result<OptimizationReport, OptimizerError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("optimize", %run_id);
        self.run(initial, cancel).instrument(span).await
    }

    async fn run(
        &mut self,
        initial: Prompt,
        cancel: &CancellationToken,
    ) -> Result<OptimizationReport, OptimizerError> {
        let config = &self.config;
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        };
        let guard = RunGuard::new(cancel.clone(), config.run_timeout, config.call_timeout);
        self.history = HistoryBuffer::new(config.history_size);

        tracing::info!(
            max_iterations = config.max_iterations,
            rating_system = ?config.rating_system,
            threshold = config.threshold,
            "Starting prompt optimization"
        );

        let mut current = initial;
        let mut best: Option<OptimizationEntry> = None;
        let mut improvements: u32 = 0;
        let mut round: u32 = 0;

        loop {
            round += 1;

            // Scoring
            let assessment = {
                let assessor = &self.assessor;
                let guard_ref = &guard;
                let prompt = &current;
                let ctx = AssessmentContext {
                    task_description: &config.task_description,
                    history: self.history.recent(),
                    metrics: &config.custom_metrics,
                    goal: &config.optimization_goal,
                };
                retry_phase(RunPhase::Scoring, policy, &guard, move || async move {
                    assessor.assess(prompt, &ctx, guard_ref).await
                })
                .await?
            };

            let entry = OptimizationEntry::new(round, current, assessment);
            tracing::info!(
                round,
                score = entry.assessment.overall_score,
                grade = %entry.assessment.overall_grade,
                "Round scored"
            );
            self.history.record(entry.clone());

            // Deciding
            if is_optimization_goal_met(config.rating_system, config.threshold, &entry.assessment) {
                tracing::info!(round, improvements, "Optimization goal met");
                return Ok(OptimizationReport::new(
                    entry,
                    round,
                    improvements,
                    StopReason::GoalMet,
                ));
            }

            let is_new_best = match &best {
                Some(b) => entry.score() > b.score(),
                None => true,
            };
            if is_new_best {
                best = Some(entry.clone());
            }

            if improvements >= config.max_iterations {
                let chosen = best.unwrap_or(entry);
                tracing::info!(
                    round,
                    improvements,
                    best_round = chosen.round,
                    best_score = chosen.score(),
                    "Iteration cap reached"
                );
                return Ok(OptimizationReport::new(
                    chosen,
                    round,
                    improvements,
                    StopReason::IterationCap,
                ));
            }

            // Improving
            let improvement = {
                let improver = &self.improver;
                let guard_ref = &guard;
                let previous = &entry;
                let ctx = ImprovementContext {
                    task_description: &config.task_description,
                    history: self.history.recent(),
                    goal: &config.optimization_goal,
                };
                retry_phase(RunPhase::Improving, policy, &guard, move || async move {
                    improver.improve(previous, &ctx, guard_ref).await
                })
                .await?
            };

            improvements += 1;
            tracing::info!(
                round,
                variant = %improvement.variant,
                expected_impact = improvement.expected_impact,
                "Applied prompt rewrite"
            );
            current = improvement.prompt;
        }
    }
}

/// Run `op` up to `max_retries + 1` times, waiting `delay` between attempts.
///
/// Only transient engine errors are retried. The returned error carries the
/// phase and the number of attempts actually made.
async fn retry_phase<T, F, Fut>(
    phase: RunPhase,
    policy: RetryPolicy,
    guard: &RunGuard,
    mut op: F,
) -> Result<T, OptimizerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    guard
        .check()
        .map_err(|e| OptimizerError::phase(phase, 0, e))?;

    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(%phase, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    %phase,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Transient failure, retrying after delay"
                );
                guard
                    .sleep(policy.delay)
                    .await
                    .map_err(|interrupt| OptimizerError::phase(phase, attempt, interrupt))?;
            }
            Err(e) => {
                tracing::warn!(%phase, attempt, error = %e, "Phase failed");
                return Err(OptimizerError::phase(phase, attempt, e));
            }
        }
    }
}

/// Convenience wrapper: build an optimizer, run it, and return only the prompt.
pub async fn optimize_prompt(
    llm: Arc<dyn LlmProvider>,
    config: OptimizerConfig,
    initial: Prompt,
    cancel: &CancellationToken,
) -> Result<Prompt, OptimizerError> {
    let mut optimizer = PromptOptimizer::new(llm, config)?;
    let report = optimizer.optimize(initial, cancel).await?;
    Ok(report.prompt)
}
