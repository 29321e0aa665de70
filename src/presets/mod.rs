//! Ready-made generator workflows built on the crate's primitives.

pub mod extract;

pub use extract::{extract_structured_data, ExtractionError, ExtractionOptions, StructuredOutput};
