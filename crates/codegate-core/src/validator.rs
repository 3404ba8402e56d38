//! Response validation and normalization.
//!
//! Turns untrusted collaborator output into a [`ScoreRecord`] or a
//! [`ValidationFailure`]. Checks run in a fixed order so the same payload
//! always fails the same way. The inbound `total_score` is only checked for
//! presence; the stored total is always re-derived from the rubric.

use serde_json::{Map, Value};

use crate::error::ValidationFailure;
use crate::model::{
    Category, DiffSuggestion, LineComment, Rubric, ScoreRecord, Severity, Verdict,
    MAX_CATEGORY_SCORE,
};

/// Top-level keys that mark an object as the assessment.
const ASSESSMENT_KEYS: [&str; 2] = ["total_score", "rubric"];

/// Pull the JSON payload out of a free-text response.
///
/// Candidates are tried in order: ```json``` fenced blocks, other fenced
/// blocks, then the whole response. The first object carrying an assessment
/// key wins, so code echoed back in a fence is skipped. Failing that, the
/// first candidate whose outermost `{ ... }` span parses as an object is
/// used, and failing that the outermost span of the first candidate.
pub fn extract_json_payload(response: &str) -> &str {
    let candidates = fenced_candidates(response);

    candidates
        .iter()
        .copied()
        .find_map(assessment_object)
        .or_else(|| {
            candidates
                .iter()
                .copied()
                .map(outermost_span)
                .find(|span| matches!(serde_json::from_str::<Value>(span), Ok(Value::Object(_))))
        })
        .unwrap_or_else(|| outermost_span(candidates.first().copied().unwrap_or(response)))
}

/// Fenced blocks (json-tagged first) followed by the whole response.
fn fenced_candidates(response: &str) -> Vec<&str> {
    let mut json_blocks = Vec::new();
    let mut other_blocks = Vec::new();
    let mut open: Option<(usize, bool)> = None;
    let mut offset = 0;

    for line in response.split_inclusive('\n') {
        let trimmed = line.trim();
        let line_end = offset + line.len();

        match open {
            None if trimmed.starts_with("```") => {
                let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
                open = Some((line_end, lang == "json"));
            }
            Some((start, is_json)) if trimmed == "```" => {
                let body = &response[start..offset];
                if is_json {
                    json_blocks.push(body);
                } else {
                    other_blocks.push(body);
                }
                open = None;
            }
            _ => {}
        }
        offset = line_end;
    }

    // Truncated response with an unclosed fence: keep what arrived.
    if let Some((start, is_json)) = open {
        let body = &response[start.min(response.len())..];
        if is_json {
            json_blocks.push(body);
        } else {
            other_blocks.push(body);
        }
    }

    json_blocks
        .into_iter()
        .chain(other_blocks)
        .chain(std::iter::once(response))
        .map(str::trim)
        .collect()
}

/// First JSON object in `text` that has an assessment key at top level.
fn assessment_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| {
        let rest = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map)))
                if ASSESSMENT_KEYS.iter().any(|key| map.contains_key(*key)) =>
            {
                Some(&rest[..stream.byte_offset()])
            }
            _ => None,
        }
    })
}

fn outermost_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Validate a raw collaborator response.
pub fn validate_response(response: &str) -> Result<ScoreRecord, ValidationFailure> {
    let payload = extract_json_payload(response);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ValidationFailure::MalformedPayload(format!("not valid JSON: {e}")))?;
    validate_value(&value)
}

/// Validate an already-parsed payload.
pub fn validate_value(value: &Value) -> Result<ScoreRecord, ValidationFailure> {
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationFailure::MalformedPayload("expected a JSON object".into()))?;

    if !obj.get("total_score").is_some_and(Value::is_number) {
        return Err(ValidationFailure::MissingField("total_score"));
    }

    // A missing rubric fails on its first category.
    let no_rubric = Map::new();
    let rubric_obj = obj
        .get("rubric")
        .and_then(Value::as_object)
        .unwrap_or(&no_rubric);
    let mut scores = [0u8; 6];
    for (slot, category) in scores.iter_mut().zip(Category::ALL) {
        *slot = category_score(rubric_obj, category)?;
    }
    let rubric = Rubric::from_scores(scores);

    let status = match obj.get("status") {
        Some(Value::String(s)) => s
            .parse::<Verdict>()
            .map_err(|_| ValidationFailure::InvalidVerdict(s.clone()))?,
        Some(other) => return Err(ValidationFailure::InvalidVerdict(other.to_string())),
        None => return Err(ValidationFailure::InvalidVerdict("missing".into())),
    };

    let feedback_summary = obj
        .get("feedback_summary")
        .and_then(Value::as_str)
        .ok_or(ValidationFailure::MissingField("feedback_summary"))?;

    let line_comments = sequence(obj, "line_comments", line_comment)?;
    let diff_suggestions = sequence(obj, "diff_suggestions", diff_suggestion)?;

    ScoreRecord::new(
        rubric,
        status,
        feedback_summary,
        line_comments,
        diff_suggestions,
    )
}

impl TryFrom<Value> for ScoreRecord {
    type Error = ValidationFailure;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        validate_value(&value)
    }
}

fn category_score(rubric: &Map<String, Value>, category: Category) -> Result<u8, ValidationFailure> {
    let out_of_range = |found: String| ValidationFailure::OutOfRangeScore { category, found };

    let value = rubric
        .get(category.key())
        .ok_or_else(|| out_of_range("nothing".into()))?;

    let score = match value.as_u64() {
        Some(n) => n,
        // Accept integral floats such as `7.0`.
        None => match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= 0.0 => f as u64,
            _ => return Err(out_of_range(value.to_string())),
        },
    };

    if score > MAX_CATEGORY_SCORE as u64 {
        return Err(out_of_range(value.to_string()));
    }
    Ok(score as u8)
}

fn sequence<T>(
    obj: &Map<String, Value>,
    field: &str,
    element: fn(&Map<String, Value>) -> Result<T, String>,
) -> Result<Vec<T>, ValidationFailure> {
    let items = obj
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationFailure::MalformedPayload(format!("{field} must be an array")))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object()
                .ok_or_else(|| "expected an object".to_string())
                .and_then(element)
                .map_err(|e| ValidationFailure::MalformedPayload(format!("{field}[{i}]: {e}")))
        })
        .collect()
}

fn text_field(obj: &Map<String, Value>, field: &str) -> Result<String, String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("{field} must be a string"))
}

fn line_comment(obj: &Map<String, Value>) -> Result<LineComment, String> {
    let line_number = obj
        .get("line_number")
        .and_then(Value::as_u64)
        .filter(|&n| n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| "line_number must be an integer >= 1".to_string())?;
    let comment = text_field(obj, "comment")?;
    let severity = obj
        .get("severity")
        .and_then(Value::as_str)
        .ok_or_else(|| "severity must be a string".to_string())?
        .parse::<Severity>()?;

    Ok(LineComment {
        line_number,
        comment,
        severity,
    })
}

fn diff_suggestion(obj: &Map<String, Value>) -> Result<DiffSuggestion, String> {
    Ok(DiffSuggestion {
        original: text_field(obj, "original")?,
        suggested: text_field(obj, "suggested")?,
        explanation: text_field(obj, "explanation")?,
    })
}
