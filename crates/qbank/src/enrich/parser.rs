//! Model response recovery.
//!
//! Models are asked for bare JSON but routinely wrap it in markdown
//! fences or prose, and failing providers can hand back HTML error pages.
//! The decoder strips one fence level, parses strictly and otherwise
//! degrades to a typed [`EnrichError::Parse`] carrying the truncated
//! offending payload.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{truncate_raw_response, EnrichError, Result};

/// Structured metadata recovered from a model reply.
///
/// Known fields are typed; anything else the model volunteers lands in
/// the `extra` extension map and survives serialization round-trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cognitive_skills: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// Display strings of the form `"A: 3"` after post-processing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_confidence: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnrichedMetadata {
    /// Converts into a field patch for the metadata store.
    pub fn into_patch(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Parses a raw model reply into [`EnrichedMetadata`].
pub fn parse_response(raw: &str) -> Result<EnrichedMetadata> {
    let candidate = extract_json_block(raw);

    let mut value: Value = serde_json::from_str(candidate).map_err(|e| EnrichError::Parse {
        message: format!("Failed to parse model response as JSON: {}", e),
        raw_response: truncate_raw_response(raw),
    })?;

    if !value.is_object() {
        return Err(EnrichError::Parse {
            message: "Model response is valid JSON but not an object".to_string(),
            raw_response: truncate_raw_response(raw),
        });
    }

    reformat_choices(&mut value);
    clamp_answer_confidence(&mut value);

    serde_json::from_value(value).map_err(|e| EnrichError::Parse {
        message: format!("Model response does not match the metadata schema: {}", e),
        raw_response: truncate_raw_response(raw),
    })
}

/// Extracts the JSON candidate from the reply: trims, and when the reply
/// is fenced takes the interior of the first code block, preferring one
/// explicitly tagged as JSON.
fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    fenced_interior(trimmed).unwrap_or(trimmed).trim()
}

fn fenced_interior(text: &str) -> Option<&str> {
    if let Some(i) = text.find("```json") {
        let after = &text[i + "```json".len()..];
        let end = after.find("```").unwrap_or(after.len());
        return Some(&after[..end]);
    }

    let i = text.find("```")?;
    let after = &text[i + 3..];

    // A language tag may still sit on the opening fence line.
    let after = match after.find('\n') {
        Some(nl) if after[..nl].trim().chars().all(|c| c.is_ascii_alphabetic()) => &after[nl + 1..],
        _ => after,
    };

    let end = after.find("```").unwrap_or(after.len());
    Some(&after[..end])
}

/// Rewrites a `choices` list of `{letter, text}` objects into display
/// strings of the form `"<letter>: <text>"`. Entries that are already
/// strings pass through unchanged.
fn reformat_choices(value: &mut Value) {
    let Some(choices) = value.get_mut("choices").and_then(Value::as_array_mut) else {
        return;
    };

    for choice in choices.iter_mut() {
        let display = match choice {
            Value::Object(obj) => {
                let letter = obj.get("letter").and_then(Value::as_str);
                let text = obj.get("text").and_then(Value::as_str);
                match (letter, text) {
                    (Some(letter), Some(text)) => format!("{}: {}", letter, text),
                    _ => choice.to_string(),
                }
            }
            Value::String(s) => s.clone(),
            ref other => other.to_string(),
        };
        *choice = Value::String(display);
    }
}

fn clamp_answer_confidence(value: &mut Value) {
    let Some(confidence) = value.get("answer_confidence").and_then(Value::as_f64) else {
        return;
    };

    if !(0.0..=1.0).contains(&confidence) {
        warn!(
            "Model returned out-of-range answer_confidence {}; clamping",
            confidence
        );
        let clamped = confidence.clamp(0.0, 1.0);
        if let Some(n) = serde_json::Number::from_f64(clamped) {
            value["answer_confidence"] = Value::Number(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
        "chapter": "Arithmetic",
        "topic": "Addition",
        "question_type": "multiple_choice",
        "difficulty_level": "easy",
        "keywords": ["addition"],
        "cognitive_skills": ["recall"],
        "cleaned_text": "What is 2+2?",
        "answer": "B",
        "choices": [
            {"letter": "A", "text": "3"},
            {"letter": "B", "text": "4"},
            {"letter": "C", "text": "5"}
        ],
        "answer_confidence": 0.97
    }"#;

    #[test]
    fn test_parse_bare_json() {
        let metadata = parse_response(WELL_FORMED).unwrap();
        assert_eq!(metadata.question_type.as_deref(), Some("multiple_choice"));
        assert_eq!(metadata.answer.as_deref(), Some("B"));
        assert_eq!(metadata.choices, vec!["A: 3", "B: 4", "C: 5"]);
        assert_eq!(metadata.answer_confidence, Some(0.97));
    }

    #[test]
    fn test_parse_json_fenced_response() {
        let raw = format!("Here is the analysis:\n```json\n{}\n```\nDone.", WELL_FORMED);
        let metadata = parse_response(&raw).unwrap();
        assert_eq!(metadata.chapter.as_deref(), Some("Arithmetic"));
    }

    #[test]
    fn test_parse_bare_fenced_response() {
        let raw = format!("```\n{}\n```", WELL_FORMED);
        let metadata = parse_response(&raw).unwrap();
        assert_eq!(metadata.topic.as_deref(), Some("Addition"));
    }

    #[test]
    fn test_prefers_json_tagged_fence() {
        let raw = format!(
            "```\nnot the payload\n```\n```json\n{}\n```",
            WELL_FORMED
        );
        let metadata = parse_response(&raw).unwrap();
        assert_eq!(metadata.answer.as_deref(), Some("B"));
    }

    #[test]
    fn test_html_response_is_parse_error() {
        let raw = "<html><body><h1>502 Bad Gateway</h1></body></html>";
        let err = parse_response(raw).unwrap_err();
        match err {
            EnrichError::Parse { raw_response, .. } => {
                assert!(raw_response.contains("502 Bad Gateway"));
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_json_is_parse_error() {
        let raw = r#"{"chapter": "Arith"#;
        assert!(matches!(
            parse_response(raw),
            Err(EnrichError::Parse { .. })
        ));
    }

    #[test]
    fn test_non_object_json_is_parse_error() {
        assert!(matches!(
            parse_response("[1, 2, 3]"),
            Err(EnrichError::Parse { .. })
        ));
    }

    #[test]
    fn test_long_raw_response_is_truncated() {
        let raw = format!("<html>{}</html>", "x".repeat(2000));
        let err = parse_response(&raw).unwrap_err();
        let preserved = err.raw_response().unwrap();
        assert!(preserved.chars().count() < 600);
        assert!(preserved.ends_with("... (truncated)"));
    }

    #[test]
    fn test_string_choices_pass_through() {
        let raw = r#"{"choices": ["A: 3", "B: 4"]}"#;
        let metadata = parse_response(raw).unwrap();
        assert_eq!(metadata.choices, vec!["A: 3", "B: 4"]);
    }

    #[test]
    fn test_unknown_fields_land_in_extension_map() {
        let raw = r#"{"question_type": "essay", "marking_notes": "award 2 marks"}"#;
        let metadata = parse_response(raw).unwrap();
        assert_eq!(
            metadata.extra.get("marking_notes").and_then(Value::as_str),
            Some("award 2 marks")
        );
    }

    #[test]
    fn test_out_of_range_confidence_is_clamped() {
        let raw = r#"{"answer_confidence": 1.7}"#;
        let metadata = parse_response(raw).unwrap();
        assert_eq!(metadata.answer_confidence, Some(1.0));
    }

    #[test]
    fn test_into_patch_skips_empty_fields() {
        let metadata = parse_response(r#"{"question_type": "essay"}"#).unwrap();
        let patch = metadata.into_patch();
        assert_eq!(
            patch.get("question_type").and_then(Value::as_str),
            Some("essay")
        );
        assert!(!patch.contains_key("keywords"));
        assert!(!patch.contains_key("answer"));
    }
}
