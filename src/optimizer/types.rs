//! Data model shared by the optimizer engines and controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::grading::LetterGrade;
use crate::error::ConfigError;
use crate::prompt::Prompt;

/// Inclusive upper bound of every score field.
pub const MAX_SCORE: f64 = 20.0;

/// A caller-supplied quality dimension, e.g. "Atmosphere".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// Short metric name.
    pub name: String,
    /// What the grader should look for.
    #[serde(default)]
    pub description: String,
}

impl Metric {
    /// Create a metric.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    /// Parse `"Name: description"`; the description part is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, description) = match s.split_once(':') {
            Some((name, description)) => (name.trim(), description.trim()),
            None => (s.trim(), ""),
        };

        if name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "metric".to_string(),
                message: format!("metric name is empty in '{}'", s),
            });
        }

        Ok(Self::new(name, description))
    }
}

/// Selects how the termination policy reads an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSystem {
    /// Goal met when `overall_score >= threshold * 20`.
    Numerical,
    /// Goal met when the overall grade is A- or better.
    Letter,
}

impl fmt::Display for RatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingSystem::Numerical => write!(f, "numerical"),
            RatingSystem::Letter => write!(f, "letter"),
        }
    }
}

impl FromStr for RatingSystem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "numerical" | "numeric" => Ok(RatingSystem::Numerical),
            "letter" => Ok(RatingSystem::Letter),
            other => Err(ConfigError::InvalidValue {
                key: "rating_system".to_string(),
                message: format!("expected 'numerical' or 'letter', got '{}'", other),
            }),
        }
    }
}

/// Score for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// A strength or weakness with a concrete example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub point: String,
    #[serde(default)]
    pub example: String,
}

/// A proposed change with its predicted impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub description: String,
    pub expected_impact: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Validated, grade-normalized judgment of one prompt.
///
/// Only produced by [`crate::optimizer::assessment::parse_assessment`], so
/// every instance has four non-empty lists, scores within `[0, 20]` and a
/// letter grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub metrics: Vec<MetricScore>,
    pub strengths: Vec<Observation>,
    pub weaknesses: Vec<Observation>,
    pub suggestions: Vec<Suggestion>,
    pub overall_score: f64,
    pub overall_grade: LetterGrade,
    pub efficiency_score: f64,
    pub alignment_with_goal: f64,
}

/// One prompt paired with its assessment; the unit of history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationEntry {
    /// 1-based round in which the prompt was scored.
    pub round: u32,
    pub prompt: Prompt,
    pub assessment: Assessment,
    pub assessed_at: DateTime<Utc>,
}

impl OptimizationEntry {
    /// Pair a prompt with its assessment, stamped with the current time.
    pub fn new(round: u32, prompt: Prompt, assessment: Assessment) -> Self {
        Self {
            round,
            prompt,
            assessment,
            assessed_at: Utc::now(),
        }
    }

    /// Shortcut for `assessment.overall_score`.
    pub fn score(&self) -> f64 {
        self.assessment.overall_score
    }
}
