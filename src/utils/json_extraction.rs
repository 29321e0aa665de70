//! JSON pre-decode normalization for LLM responses.
//!
//! Generators are told to return a bare JSON object but frequently wrap it
//! in a markdown code fence anyway. Every decode path in the crate runs the
//! raw response through [`strip_code_fences`] first, then hands the result
//! to `serde_json`.
//!
//! # Contract
//!
//! `strip_code_fences` removes, after trimming surrounding whitespace:
//! - one leading fence marker (```` ``` ```` with an optional language tag
//!   such as `json`) together with the rest of that marker's line, and
//! - one trailing ```` ``` ```` marker.
//!
//! Interior content is never altered: fences in the middle of the text,
//! prose, and whitespace inside the payload are left untouched. Input
//! without a leading fence is returned trimmed and otherwise unchanged.
//!
//! ```
//! use prompt_forge::utils::json_extraction::strip_code_fences;
//!
//! assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
//! assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
//! ```

use regex::Regex;
use std::sync::LazyLock;

static OPENING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```[A-Za-z0-9_+.-]*[ \t]*(?:\r?\n)?").expect("opening fence pattern is valid")
});

const FENCE: &str = "```";

/// Strip a leading and a trailing markdown code fence from `content`.
///
/// See the module documentation for the exact contract.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();

    let Some(opening) = OPENING_FENCE.find(trimmed) else {
        return trimmed;
    };

    let body = &trimmed[opening.end()..];
    let body = body.strip_suffix(FENCE).unwrap_or(body);
    body.trim()
}

/// Analysis result for JSON structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStructureAnalysis {
    /// Number of unclosed braces ('{' without matching '}').
    pub unclosed_braces: usize,
    /// Number of unclosed brackets ('[' without matching ']').
    pub unclosed_brackets: usize,
    /// Whether the scan ended inside a string literal.
    pub in_string: bool,
    /// The position where JSON-like content starts (first '{' or '[').
    pub json_start: Option<usize>,
}

impl JsonStructureAnalysis {
    /// Whether the content looks like JSON that was cut off mid-object.
    pub fn is_truncated(&self) -> bool {
        self.json_start.is_some()
            && (self.unclosed_braces > 0 || self.unclosed_brackets > 0 || self.in_string)
    }
}

/// Scan `s` tracking brace/bracket depth and string state.
pub fn analyze_json_structure(s: &str) -> JsonStructureAnalysis {
    let mut brace_depth: isize = 0;
    let mut bracket_depth: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut json_start: Option<usize> = None;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                json_start.get_or_insert(i);
                brace_depth += 1;
            }
            '}' if !in_string => brace_depth -= 1,
            '[' if !in_string => {
                json_start.get_or_insert(i);
                bracket_depth += 1;
            }
            ']' if !in_string => bracket_depth -= 1,
            _ => {}
        }
    }

    JsonStructureAnalysis {
        unclosed_braces: brace_depth.max(0) as usize,
        unclosed_brackets: bracket_depth.max(0) as usize,
        in_string,
        json_start,
    }
}

/// Build a human-readable reason for a failed decode of `cleaned`.
///
/// Distinguishes truncated output (usually a max-token cut-off) from
/// content that is not JSON at all, and includes a short preview.
pub fn describe_decode_failure(cleaned: &str, error: &serde_json::Error) -> String {
    let analysis = analyze_json_structure(cleaned);
    let preview = preview(cleaned, 120);

    if analysis.json_start.is_none() {
        format!("no JSON object found ({}); content starts with '{}'", error, preview)
    } else if analysis.is_truncated() {
        format!(
            "JSON appears truncated: {} unclosed braces, {} unclosed brackets ({}); partial: '{}'",
            analysis.unclosed_braces, analysis.unclosed_brackets, error, preview
        )
    } else {
        format!("{}; content starts with '{}'", error, preview)
    }
}

/// First `max_chars` characters of `s`, respecting char boundaries.
pub fn preview(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_json_untouched() {
        let raw = r#"{"overallScore": 15}"#;
        assert_eq!(strip_code_fences(raw), raw);
    }

    #[test]
    fn test_strip_json_fence() {
        let raw = "```json\n{\"a\": [1, 2]}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": [1, 2]}");
    }

    #[test]
    fn test_strip_bare_fence_with_surrounding_whitespace() {
        let raw = "\n\n```\n{\"a\": 1}\n```\n  ";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_single_line_fence() {
        assert_eq!(strip_code_fences("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_missing_closing_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_interior_content_preserved() {
        let raw = "```json\n{\"example\": \"use ``` to fence code\",\n  \"n\": 1}\n```";
        assert_eq!(
            strip_code_fences(raw),
            "{\"example\": \"use ``` to fence code\",\n  \"n\": 1}"
        );
    }

    #[test]
    fn test_prose_before_fence_not_stripped() {
        let raw = "Here you go:\n```json\n{}\n```";
        assert_eq!(strip_code_fences(raw), raw.trim());
    }

    #[test]
    fn test_analyze_truncated() {
        let analysis = analyze_json_structure(r#"{"metrics": [{"name": "x""#);
        assert!(analysis.is_truncated());
        assert_eq!(analysis.unclosed_braces, 2);
        assert_eq!(analysis.unclosed_brackets, 1);
        assert_eq!(analysis.json_start, Some(0));
    }

    #[test]
    fn test_analyze_ignores_braces_in_strings() {
        let analysis = analyze_json_structure(r#"{"text": "a { b [ c"}"#);
        assert!(!analysis.is_truncated());
    }

    #[test]
    fn test_describe_decode_failure_variants() {
        let not_json = "I cannot comply";
        let err = serde_json::from_str::<serde_json::Value>(not_json).unwrap_err();
        assert!(describe_decode_failure(not_json, &err).starts_with("no JSON object found"));

        let truncated = r#"{"a": [1, 2"#;
        let err = serde_json::from_str::<serde_json::Value>(truncated).unwrap_err();
        assert!(describe_decode_failure(truncated, &err).contains("truncated"));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("hi", 10), "hi");
    }
}
