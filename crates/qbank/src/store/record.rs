//! Canonical metadata record and merge-patch semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Fields the store stamps itself; a merge patch may not touch them.
/// `review_completed` only moves through the review toggle, which owns
/// the timestamp invariant.
pub const RESERVED_FIELDS: &[&str] = &[
    "filename",
    "created",
    "last_updated",
    "review_completed",
    "review_completed_at",
];

const STRING_FIELDS: &[&str] = &[
    "subject",
    "chapter",
    "topic",
    "subtopic",
    "question_type",
    "difficulty_level",
    "cleaned_text",
    "answer",
];

const STRING_LIST_FIELDS: &[&str] = &["keywords", "cognitive_skills", "choices"];

/// Metadata for a single question image.
///
/// Known enrichment fields are typed and optional; anything else (snipping
/// tool provenance, ad-hoc reviewer notes) lives in the flattened `extra`
/// extension map. `created`/`last_updated` are optional because metadata
/// files predating this pipeline carry entries without them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataRecord {
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,

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

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_confidence: Option<f64>,

    #[serde(default)]
    pub review_completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataRecord {
    /// Synthesizes an empty record, created and last-updated now.
    pub fn new(filename: &str, now: DateTime<Utc>) -> Self {
        Self {
            filename: filename.to_string(),
            subject: None,
            chapter: None,
            topic: None,
            subtopic: None,
            question_type: None,
            difficulty_level: None,
            keywords: Vec::new(),
            cognitive_skills: Vec::new(),
            cleaned_text: None,
            answer: None,
            choices: Vec::new(),
            answer_confidence: None,
            review_completed: false,
            review_completed_at: None,
            created: Some(now),
            last_updated: Some(now),
            extra: Map::new(),
        }
    }

    /// The record's metadata map as seen by the enrichment prompt.
    pub fn as_prompt_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Checks a merge patch before it touches any record: reserved fields are
/// rejected and known typed fields must carry the right JSON shape.
pub fn validate_patch(patch: &Map<String, Value>) -> Result<(), StoreError> {
    for (key, value) in patch {
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(StoreError::InvalidField {
                field: key.clone(),
                reason: "field is managed by the store and cannot be patched".to_string(),
            });
        }

        if STRING_FIELDS.contains(&key.as_str()) && !value.is_string() && !value.is_null() {
            return Err(StoreError::InvalidField {
                field: key.clone(),
                reason: "expected a string or null".to_string(),
            });
        }

        if STRING_LIST_FIELDS.contains(&key.as_str()) {
            let valid = match value {
                Value::Null => true,
                Value::Array(items) => items.iter().all(Value::is_string),
                _ => false,
            };
            if !valid {
                return Err(StoreError::InvalidField {
                    field: key.clone(),
                    reason: "expected a list of strings or null".to_string(),
                });
            }
        }

        if key == "answer_confidence" {
            match value.as_f64() {
                Some(n) if (0.0..=1.0).contains(&n) => {}
                _ if value.is_null() => {}
                _ => {
                    return Err(StoreError::InvalidField {
                        field: key.clone(),
                        reason: "expected a number between 0 and 1".to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Applies a validated patch: supplied fields overwrite, everything else
/// is preserved. Unknown keys land in the extension map.
pub fn apply_patch(record: &mut MetadataRecord, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match key.as_str() {
            "subject" => record.subject = as_opt_string(value),
            "chapter" => record.chapter = as_opt_string(value),
            "topic" => record.topic = as_opt_string(value),
            "subtopic" => record.subtopic = as_opt_string(value),
            "question_type" => record.question_type = as_opt_string(value),
            "difficulty_level" => record.difficulty_level = as_opt_string(value),
            "cleaned_text" => record.cleaned_text = as_opt_string(value),
            "answer" => record.answer = as_opt_string(value),
            "keywords" => record.keywords = as_string_list(value),
            "cognitive_skills" => record.cognitive_skills = as_string_list(value),
            "choices" => record.choices = as_string_list(value),
            "answer_confidence" => record.answer_confidence = value.as_f64(),
            _ => {
                record.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

fn as_opt_string(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_string())
}

fn as_string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
