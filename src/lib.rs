//! prompt-forge: iterative prompt optimization with an LLM as grader and editor.
//!
//! This library assesses a prompt against a task, asks for rewrites, and
//! repeats until a rating goal or an iteration cap is reached. It also
//! ships a structured-data extraction preset and the `prompt-forge` CLI.

// Core modules
pub mod cli;
pub mod error;
pub mod llm;
pub mod optimizer;
pub mod presets;
pub mod prompt;
pub mod utils;

// Re-export commonly used types
pub use error::{ConfigError, LlmError};
pub use optimizer::{
    EngineError, OptimizationReport, OptimizerConfig, OptimizerError, PromptOptimizer,
};
pub use prompt::Prompt;
