//! Iterative prompt optimization.
//!
//! A [`PromptOptimizer`] repeatedly grades a prompt with the
//! [`AssessmentEngine`], keeps the last few rounds in a [`HistoryBuffer`],
//! and asks the [`ImprovementEngine`] for a better version until the
//! configured rating goal is met or the iteration cap is reached.
//!
//! ```ignore
//! use std::sync::Arc;
//! use prompt_forge::llm::LiteLlmClient;
//! use prompt_forge::optimizer::{OptimizerConfig, PromptOptimizer, RatingSystem};
//! use prompt_forge::Prompt;
//! use tokio_util::sync::CancellationToken;
//!
//! let llm = Arc::new(LiteLlmClient::from_env()?);
//! let config = OptimizerConfig::new("Write the opening of a mystery novel")
//!     .with_rating_system(RatingSystem::Numerical)
//!     .with_threshold(0.85);
//! let mut optimizer = PromptOptimizer::new(llm, config)?;
//! let report = optimizer
//!     .optimize(Prompt::new("Write a mystery opening"), &CancellationToken::new())
//!     .await?;
//! println!("{}", report.prompt);
//! ```

pub mod assessment;
pub mod config;
pub mod controller;
pub mod error;
pub mod grading;
pub mod guard;
pub mod history;
pub mod improvement;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use assessment::{parse_assessment, AssessmentContext, AssessmentEngine};
pub use config::{load_metrics_file, OptimizerConfig, DEFAULT_OPTIMIZATION_GOAL};
pub use controller::{optimize_prompt, OptimizationReport, PromptOptimizer, StopReason};
pub use error::{EngineError, OptimizerError, RunPhase};
pub use grading::{is_optimization_goal_met, normalize_grade, LetterGrade};
pub use guard::RunGuard;
pub use history::HistoryBuffer;
pub use improvement::{
    parse_improvement, select_variant, Improvement, ImprovementContext, ImprovementEngine, Variant,
};
pub use types::{
    Assessment, Metric, MetricScore, Observation, OptimizationEntry, RatingSystem, Suggestion,
    MAX_SCORE,
};
