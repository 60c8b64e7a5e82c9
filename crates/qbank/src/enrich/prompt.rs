//! Prompt construction for metadata enrichment.

use serde_json::{Map, Value};

use super::syllabus::Subject;

/// Identity and positional fields from the snipping tool that add nothing
/// to the model's analysis.
const EXCLUDED_FIELDS: &[&str] = &["filename", "original_image", "coordinates"];

/// Formats existing metadata into a readable block for the prompt.
///
/// Identity fields and empty values are skipped; field names are
/// capitalized for readability.
pub fn format_existing_metadata(existing: &Map<String, Value>) -> String {
    let formatted: Vec<String> = existing
        .iter()
        .filter(|(key, value)| !EXCLUDED_FIELDS.contains(&key.as_str()) && !is_falsy(value))
        .map(|(key, value)| format!("{}: {}", capitalize(key), render_value(value)))
        .collect();

    if formatted.is_empty() {
        "No existing metadata.".to_string()
    } else {
        formatted.join("\n")
    }
}

/// Builds the full enrichment prompt: task framing, question text,
/// existing metadata, optional syllabus reference and the target JSON
/// schema.
pub fn build_prompt(ocr_text: &str, existing: Option<&Map<String, Value>>) -> String {
    let metadata_block = existing
        .map(format_existing_metadata)
        .unwrap_or_else(|| "No existing metadata.".to_string());

    let syllabus_block = existing
        .and_then(Subject::detect)
        .map(|subject| format!("\n{}\n", subject.syllabus_reference()))
        .unwrap_or_default();

    format!(
        r#"You are an expert in educational assessment. Analyze the following exam question and generate enhanced metadata for it.

QUESTION TEXT:
{ocr_text}

EXISTING METADATA:
{metadata_block}
{syllabus_block}
Please generate the following additional metadata:
1. Chapter and topic classification
2. Question type (multiple_choice, short_answer, calculation, essay, etc.)
3. Difficulty level (easy, medium, hard)
4. Keywords or key concepts
5. Cognitive skills required (recall, understanding, application, analysis, evaluation, creation)
6. A cleaned and properly formatted version of the question text
7. The correct answer, the answer choices if present, and your confidence in the answer

Return your analysis in the following JSON format:
```json
{{
  "chapter": "string",
  "topic": "string",
  "question_type": "string",
  "difficulty_level": "string",
  "keywords": ["string"],
  "cognitive_skills": ["string"],
  "cleaned_text": "string",
  "answer": "string",
  "choices": [{{"letter": "string", "text": "string"}}],
  "answer_confidence": 0.0
}}
```

Do not include any other text in your response - only the JSON.
"#
    )
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}
