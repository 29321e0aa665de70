//! Error types for the optimizer engines and controller.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::{ConfigError, LlmError};

/// Failure of a single assessment or improvement call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The generator call itself failed.
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    /// The generator answered with no usable text.
    #[error("generator returned an empty response")]
    EmptyResponse,

    /// The response was not valid JSON of the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The response decoded but broke a structural rule.
    #[error("invalid response: {0}")]
    Validation(String),

    /// The overall grade could not be normalized.
    #[error("invalid overall grade: {0}")]
    Grade(String),

    /// One of the required improvement variants was absent.
    #[error("response is missing {0}")]
    MissingVariant(String),

    /// The run's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// A run or per-call deadline expired.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl EngineError {
    /// Whether the same call may succeed if attempted again.
    ///
    /// Only network/provider-side failures qualify. Malformed, invalid and
    /// interrupted calls are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Generation(err) => err.is_transient(),
            EngineError::EmptyResponse => true,
            EngineError::Malformed(_)
            | EngineError::Validation(_)
            | EngineError::Grade(_)
            | EngineError::MissingVariant(_)
            | EngineError::Cancelled
            | EngineError::DeadlineExceeded => false,
        }
    }
}

/// Controller state in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Scoring,
    Improving,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Scoring => write!(f, "scoring"),
            RunPhase::Improving => write!(f, "improving"),
        }
    }
}

/// Failure of a whole optimization run.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// The configuration was rejected at construction time.
    #[error("invalid optimizer configuration: {0}")]
    Config(#[from] ConfigError),

    /// A phase failed for good.
    #[error("{phase} failed after {attempts} attempt(s): {source}")]
    Phase {
        phase: RunPhase,
        attempts: u32,
        #[source]
        source: EngineError,
    },
}

impl OptimizerError {
    pub(crate) fn phase(phase: RunPhase, attempts: u32, source: EngineError) -> Self {
        OptimizerError::Phase {
            phase,
            attempts,
            source,
        }
    }

    /// Phase the run was in when it failed, if it got that far.
    pub fn failed_phase(&self) -> Option<RunPhase> {
        match self {
            OptimizerError::Phase { phase, .. } => Some(*phase),
            OptimizerError::Config(_) => None,
        }
    }

    /// Attempts made in the failing phase.
    pub fn attempts(&self) -> u32 {
        match self {
            OptimizerError::Phase { attempts, .. } => *attempts,
            OptimizerError::Config(_) => 0,
        }
    }

    /// The underlying engine error, if any.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            OptimizerError::Phase { source, .. } => Some(source),
            OptimizerError::Config(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.engine_error(), Some(EngineError::Cancelled))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.engine_error(), Some(EngineError::DeadlineExceeded))
    }
}
