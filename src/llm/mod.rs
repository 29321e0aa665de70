//! LLM integration for prompt-forge.
//!
//! This module is the only network-facing boundary of the crate. Engines
//! depend on the [`LlmProvider`] trait and never inspect which provider sits
//! behind it.
//!
//! ```ignore
//! use prompt_forge::llm::{GenerationOptions, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationOptions::default()
//!     .with_temperature(0.2)
//!     .request(vec![Message::user("Hello!")]);
//! let response = client.generate(request).await?;
//! ```
//!
//! # Debug capture
//!
//! Raw prompt and response text can be captured through a [`DebugSink`],
//! independently of the regular `tracing` output.

pub mod debug;
pub mod litellm;

pub use debug::{DebugOptions, DebugSink, NoopDebugSink, SharedDebugSink, TracingDebugSink};
pub use litellm::{
    Choice, GenerationOptions, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider,
    Message, DEFAULT_MODEL, OPENROUTER_API_BASE,
};
