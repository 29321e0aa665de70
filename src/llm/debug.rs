//! Diagnostic capture of raw prompts and responses.
//!
//! A [`DebugSink`] receives the exact text sent to and received from the
//! generator. Sinks are fire-and-forget: the methods return nothing, so a
//! misbehaving sink can never fail an optimization run.

use std::sync::Arc;

/// Tracing target used for captured prompt/response text.
pub const DEBUG_TARGET: &str = "prompt_forge::debug";

/// Receiver for raw generator traffic.
pub trait DebugSink: Send + Sync {
    /// Record a prompt about to be sent.
    fn log_prompt(&self, text: &str);

    /// Record a raw response as received.
    fn log_response(&self, text: &str);
}

/// Options controlling what [`TracingDebugSink`] forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugOptions {
    /// Forward prompts.
    pub log_prompts: bool,
    /// Forward raw responses.
    pub log_responses: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            log_prompts: true,
            log_responses: true,
        }
    }
}

/// Sink that forwards captured text to `tracing` at debug level.
#[derive(Debug, Clone, Default)]
pub struct TracingDebugSink {
    options: DebugOptions,
}

impl TracingDebugSink {
    /// Create a sink with explicit options.
    pub fn new(options: DebugOptions) -> Self {
        Self { options }
    }
}

impl DebugSink for TracingDebugSink {
    fn log_prompt(&self, text: &str) {
        if self.options.log_prompts {
            tracing::debug!(target: DEBUG_TARGET, chars = text.len(), prompt = %text, "LLM prompt");
        }
    }

    fn log_response(&self, text: &str) {
        if self.options.log_responses {
            tracing::debug!(target: DEBUG_TARGET, chars = text.len(), response = %text, "LLM response");
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDebugSink;

impl DebugSink for NoopDebugSink {
    fn log_prompt(&self, _text: &str) {}

    fn log_response(&self, _text: &str) {}
}

/// Shared handle used by the engines.
pub type SharedDebugSink = Arc<dyn DebugSink>;
