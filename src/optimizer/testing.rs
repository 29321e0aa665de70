//! Scripted generator used by the optimizer unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider};

/// One scripted reply.
pub enum Reply {
    Text(String),
    Fail(LlmError),
    /// Answer after sleeping, for deadline tests.
    Slow(Duration, String),
}

/// Provider that pops replies in order and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Reply::Text(t.into())))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.requests.lock().expect("lock").push(request);
        let reply = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .expect("scripted provider ran out of replies");

        match reply {
            Reply::Text(text) => Ok(GenerationResponse::from_text("scripted", text)),
            Reply::Fail(err) => Err(err),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(GenerationResponse::from_text("scripted", text))
            }
        }
    }
}

/// A well-formed assessment response with the given score and grade token.
pub fn assessment_json(score: f64, grade: &str) -> String {
    serde_json::json!({
        "metrics": [{"name": "Clarity", "value": score, "reasoning": "Clear enough"}],
        "strengths": [{"point": "Concise", "example": "Single sentence"}],
        "weaknesses": [{"point": "No audience", "example": "Reader unspecified"}],
        "suggestions": [{"description": "Name the audience", "expectedImpact": 14, "reasoning": "Sets tone"}],
        "overallScore": score,
        "overallGrade": grade,
        "efficiencyScore": 15,
        "alignmentWithGoal": 13
    })
    .to_string()
}

/// A well-formed improvement response.
pub fn improvement_json(incremental: &str, bold: &str, inc_impact: f64, bold_impact: f64) -> String {
    serde_json::json!({
        "incrementalImprovement": {
            "input": incremental,
            "directives": ["Keep it short"],
            "examples": [],
            "reasoning": "Targets the weakness"
        },
        "boldRedesign": {
            "input": bold,
            "directives": ["Start over"],
            "examples": ["An example"],
            "reasoning": "Rethinks the structure"
        },
        "expectedImpact": {"incremental": inc_impact, "bold": bold_impact}
    })
    .to_string()
}
