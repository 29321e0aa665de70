//! Run-wide optimizer configuration.
//!
//! An [`OptimizerConfig`] starts from documented defaults, is adjusted with
//! `with_*` builder methods (or environment variables), and is validated
//! once when a [`crate::optimizer::PromptOptimizer`] is constructed.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::GenerationOptions;

use super::types::{Metric, RatingSystem};

/// Goal used when the caller does not supply one.
pub const DEFAULT_OPTIMIZATION_GOAL: &str = "Improve the clarity and effectiveness of the prompt";

/// Configuration for one optimization run. Immutable once handed to the optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    // Task settings
    /// What the optimized prompt is supposed to accomplish.
    pub task_description: String,
    /// What "better" means for this run.
    pub optimization_goal: String,
    /// Extra quality dimensions the grader must score.
    pub custom_metrics: Vec<Metric>,

    // Termination settings
    /// Success criterion; `None` means the goal is never met.
    pub rating_system: Option<RatingSystem>,
    /// Fraction of the 20-point scale required in numerical mode (0.0-1.0).
    pub threshold: f64,
    /// Maximum number of improvement rounds.
    pub max_iterations: u32,
    /// Number of past rounds shown to the engines.
    pub history_size: usize,

    // Retry settings
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
    /// Wait between attempts.
    pub retry_delay: Duration,

    // Deadlines
    /// Deadline for the whole run.
    pub run_timeout: Option<Duration>,
    /// Deadline for each generation call.
    pub call_timeout: Option<Duration>,

    // LLM settings
    /// Options for assessment requests.
    pub assessment_options: GenerationOptions,
    /// Options for improvement requests.
    pub improvement_options: GenerationOptions,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            task_description: String::new(),
            optimization_goal: DEFAULT_OPTIMIZATION_GOAL.to_string(),
            custom_metrics: Vec::new(),

            rating_system: None,
            threshold: 0.8,
            max_iterations: 5,
            history_size: 2,

            max_retries: 3,
            retry_delay: Duration::from_secs(2),

            run_timeout: None,
            call_timeout: None,

            // Grading wants low variance, rewriting wants some creativity.
            assessment_options: GenerationOptions::default().with_temperature(0.2),
            improvement_options: GenerationOptions::default().with_temperature(0.7),
        }
    }
}

impl OptimizerConfig {
    /// Creates a configuration for `task_description` with default values.
    pub fn new(task_description: impl Into<String>) -> Self {
        Self {
            task_description: task_description.into(),
            ..Self::default()
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PROMPT_FORGE_GOAL`: Optimization goal
    /// - `PROMPT_FORGE_RATING_SYSTEM`: `numerical` or `letter` (empty = unset)
    /// - `PROMPT_FORGE_THRESHOLD`: Numerical threshold (default: 0.8)
    /// - `PROMPT_FORGE_MAX_ITERATIONS`: Improvement rounds (default: 5)
    /// - `PROMPT_FORGE_HISTORY_SIZE`: Remembered rounds (default: 2)
    /// - `PROMPT_FORGE_MAX_RETRIES`: Retries per phase (default: 3)
    /// - `PROMPT_FORGE_RETRY_DELAY_MS`: Delay between attempts (default: 2000)
    /// - `PROMPT_FORGE_RUN_TIMEOUT_SECS`: Whole-run deadline
    /// - `PROMPT_FORGE_MODEL`: Model for both engines
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env(task_description: impl Into<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new(task_description);

        if let Ok(val) = std::env::var("PROMPT_FORGE_GOAL") {
            config.optimization_goal = val;
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_RATING_SYSTEM") {
            config.rating_system = parse_rating_system(&val)?;
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_THRESHOLD") {
            config.threshold = parse_env_value(&val, "PROMPT_FORGE_THRESHOLD")?;
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_MAX_ITERATIONS") {
            config.max_iterations = parse_env_value(&val, "PROMPT_FORGE_MAX_ITERATIONS")?;
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_HISTORY_SIZE") {
            config.history_size = parse_env_value(&val, "PROMPT_FORGE_HISTORY_SIZE")?;
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_MAX_RETRIES") {
            config.max_retries = parse_env_value(&val, "PROMPT_FORGE_MAX_RETRIES")?;
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_RETRY_DELAY_MS") {
            let millis: u64 = parse_env_value(&val, "PROMPT_FORGE_RETRY_DELAY_MS")?;
            config.retry_delay = Duration::from_millis(millis);
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_RUN_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "PROMPT_FORGE_RUN_TIMEOUT_SECS")?;
            config.run_timeout = Some(Duration::from_secs(secs));
        }

        if let Ok(val) = std::env::var("PROMPT_FORGE_MODEL") {
            config = config.with_model(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_description.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "task_description cannot be empty".to_string(),
            ));
        }

        if self.optimization_goal.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "optimization_goal cannot be empty".to_string(),
            ));
        }

        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::ValidationFailed(
                "threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for metric in &self.custom_metrics {
            let name = metric.name.trim();
            if name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "custom metric names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "duplicate custom metric '{}'",
                    name
                )));
            }
        }

        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "run_timeout must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "call_timeout must be greater than 0".to_string(),
            ));
        }

        for (label, options) in [
            ("assessment", &self.assessment_options),
            ("improvement", &self.improvement_options),
        ] {
            if let Some(temperature) = options.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(ConfigError::ValidationFailed(format!(
                        "{} temperature must be between 0.0 and 2.0",
                        label
                    )));
                }
            }
        }

        Ok(())
    }

    /// Builder method to set the optimization goal.
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.optimization_goal = goal.into();
        self
    }

    /// Builder method to append custom metrics.
    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.custom_metrics.extend(metrics);
        self
    }

    /// Builder method to set the rating system.
    pub fn with_rating_system(mut self, rating_system: RatingSystem) -> Self {
        self.rating_system = Some(rating_system);
        self
    }

    /// Builder method to set the numerical threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder method to set the maximum number of improvement rounds.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Builder method to set how many past rounds the engines see.
    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    /// Builder method to set the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builder method to set the delay between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Builder method to set the whole-run deadline.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Builder method to set the per-call deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Builder method to use `model` for both engines.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.assessment_options.model = model.clone();
        self.improvement_options.model = model;
        self
    }

    /// Builder method to replace assessment generation options.
    pub fn with_assessment_options(mut self, options: GenerationOptions) -> Self {
        self.assessment_options = options;
        self
    }

    /// Builder method to replace improvement generation options.
    pub fn with_improvement_options(mut self, options: GenerationOptions) -> Self {
        self.improvement_options = options;
        self
    }
}

/// Parse a rating-system selector; empty means unset.
pub fn parse_rating_system(value: &str) -> Result<Option<RatingSystem>, ConfigError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    value.parse().map(Some)
}

/// Load custom metrics from a YAML list of `{name, description}` maps.
pub fn load_metrics_file(path: impl AsRef<Path>) -> Result<Vec<Metric>, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let metrics: Vec<Metric> = serde_yaml::from_str(&content)?;
    Ok(metrics)
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
