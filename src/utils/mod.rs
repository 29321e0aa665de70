//! Shared utility functions for prompt-forge.
//!
//! The pre-decode normalization applied to every LLM response and the
//! placeholder filling used to build requests.

pub mod json_extraction;
pub mod template;

pub use json_extraction::{
    analyze_json_structure, describe_decode_failure, strip_code_fences, JsonStructureAnalysis,
};
pub use template::fill_template;
