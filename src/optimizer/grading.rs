//! Grade normalization and the goal-met policy.
//!
//! Two fixed tables drive this module:
//!
//! | numeric overall grade | letter |
//! |-----------------------|--------|
//! | `>= 19`               | A+     |
//! | `>= 17`               | A      |
//! | `>= 14`               | B      |
//! | `>= 10`               | C      |
//! | `>= 6`                | D      |
//! | otherwise             | F      |
//!
//! and the grade-point table (A+ = 4.3, A = 4.0, A- = 3.7, ... F = 0.0) used
//! by the letter rating system, where A- (3.7) or better meets the goal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::types::{Assessment, RatingSystem, MAX_SCORE};

/// Grade points at or above which a letter grade meets the goal (A-).
pub const LETTER_GOAL_POINTS: f64 = 3.7;

/// Lower bounds for mapping a numeric grade onto the letter scale.
/// Ordered from highest to lowest; the last band catches everything.
pub const NUMERIC_GRADE_BANDS: [(f64, LetterGrade); 6] = [
    (19.0, LetterGrade::APlus),
    (17.0, LetterGrade::A),
    (14.0, LetterGrade::B),
    (10.0, LetterGrade::C),
    (6.0, LetterGrade::D),
    (0.0, LetterGrade::F),
];

const SCORE_TOLERANCE: f64 = 1e-9;

/// Letter grade on the A+ .. F scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

impl LetterGrade {
    /// Every grade, best first.
    pub const ALL: [LetterGrade; 13] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::CMinus,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::DMinus,
        LetterGrade::F,
    ];

    /// Grade points on the 0.0 - 4.3 scale.
    pub fn points(self) -> f64 {
        match self {
            LetterGrade::APlus => 4.3,
            LetterGrade::A => 4.0,
            LetterGrade::AMinus => 3.7,
            LetterGrade::BPlus => 3.3,
            LetterGrade::B => 3.0,
            LetterGrade::BMinus => 2.7,
            LetterGrade::CPlus => 2.3,
            LetterGrade::C => 2.0,
            LetterGrade::CMinus => 1.7,
            LetterGrade::DPlus => 1.3,
            LetterGrade::D => 1.0,
            LetterGrade::DMinus => 0.7,
            LetterGrade::F => 0.0,
        }
    }

    /// The token used on the wire, e.g. `"A-"`.
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::CMinus => "C-",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::DMinus => "D-",
            LetterGrade::F => "F",
        }
    }

    /// Map a numeric grade in `[0, 20]` through [`NUMERIC_GRADE_BANDS`].
    ///
    /// Returns `None` for non-finite or out-of-range values.
    pub fn from_score(score: f64) -> Option<LetterGrade> {
        if !score.is_finite() || !(0.0..=MAX_SCORE).contains(&score) {
            return None;
        }
        NUMERIC_GRADE_BANDS
            .iter()
            .find(|(lower, _)| score >= *lower)
            .map(|(_, grade)| *grade)
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_uppercase();
        LetterGrade::ALL
            .into_iter()
            .find(|grade| grade.as_str() == token)
            .ok_or_else(|| format!("unknown letter grade '{}'", s.trim()))
    }
}

/// Normalize a raw `overallGrade` value into a [`LetterGrade`].
///
/// Letter tokens are kept as-is (case-insensitive). Numeric grades, either
/// JSON numbers or numeric strings, are mapped onto the letter scale.
/// Anything else is rejected.
pub fn normalize_grade(raw: &Value) -> Result<LetterGrade, String> {
    match raw {
        Value::Number(n) => {
            let score = n
                .as_f64()
                .ok_or_else(|| format!("grade '{}' is not representable as a number", n))?;
            numeric_grade(score)
        }
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(score) => numeric_grade(score),
            Err(_) => s.parse::<LetterGrade>(),
        },
        Value::Null => Err("overallGrade is missing".to_string()),
        other => Err(format!("overallGrade has unsupported type: {}", other)),
    }
}

fn numeric_grade(score: f64) -> Result<LetterGrade, String> {
    LetterGrade::from_score(score)
        .ok_or_else(|| format!("numeric grade {} is outside 0-{}", score, MAX_SCORE))
}

/// Whether `assessment` satisfies the run's success criterion.
///
/// Numerical: `overall_score >= threshold * 20`, inclusive and tolerant of
/// float rounding. Letter: grade points >= 3.7 (A- or better). With no
/// rating system the goal is never met and only the iteration cap stops
/// the run.
pub fn is_optimization_goal_met(
    rating_system: Option<RatingSystem>,
    threshold: f64,
    assessment: &Assessment,
) -> bool {
    match rating_system {
        None => false,
        Some(RatingSystem::Numerical) => {
            assessment.overall_score + SCORE_TOLERANCE >= threshold * MAX_SCORE
        }
        Some(RatingSystem::Letter) => assessment.overall_grade.points() >= LETTER_GOAL_POINTS,
    }
}
