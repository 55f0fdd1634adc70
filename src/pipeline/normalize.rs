//! Response normalisation: recover a typed analysis from free-form model text.
//!
//! Models are asked for a bare JSON object but routinely wrap it in a code
//! fence or a sentence of prose. Recovery tries, in order:
//!
//! 1. the whole reply as JSON,
//! 2. the body of the first fenced block (optionally tagged `json`),
//! 3. the span from the first `{` to the last `}`.
//!
//! The first attempt that yields a JSON object wins. Field normalisation then
//! runs the same way whichever attempt succeeded, so equivalent content
//! always produces an identical [`PaperAnalysis`].

use crate::error::ParseError;
use crate::output::{Category, PaperAnalysis};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Rating used when the model omits one or sends something non-numeric.
pub const DEFAULT_RATING: u8 = 5;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

/// Tags beyond this count are dropped.
pub const MAX_TAGS: usize = 8;

/// One recovery attempt: returns the parsed object or `None`.
type Attempt = fn(&str) -> Option<Map<String, Value>>;

/// Recovery attempts in the order they are tried.
const ATTEMPTS: [(&str, Attempt); 3] = [
    ("direct", parse_direct),
    ("fenced", parse_fenced),
    ("brace_span", parse_brace_span),
];

/// Parse and normalise a full-paper analysis reply.
pub fn normalize_analysis(raw: &str) -> Result<PaperAnalysis, ParseError> {
    let object = extract_json_object(raw)?;
    Ok(normalize_fields(&object))
}

/// Run the recovery attempts and return the first JSON object found.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    ATTEMPTS
        .iter()
        .find_map(|(name, attempt)| {
            attempt(raw).inspect(|_| debug!("Model reply parsed via {} attempt", name))
        })
        .ok_or(ParseError::NoJsonFound)
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_direct(raw: &str) -> Option<Map<String, Value>> {
    as_object(raw)
}

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").unwrap());

fn parse_fenced(raw: &str) -> Option<Map<String, Value>> {
    let caps = RE_FENCED.captures(raw)?;
    as_object(&caps[1])
}

fn parse_brace_span(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&raw[start..=end])
}

/// Apply field defaults and bounds to a parsed object.
pub fn normalize_fields(object: &Map<String, Value>) -> PaperAnalysis {
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let mut tags = string_list(object.get("tags"));
    tags.truncate(MAX_TAGS);

    let key_findings = string_list(object.get("keyFindings").or_else(|| object.get("key_findings")));

    PaperAnalysis {
        summary,
        rating: normalize_rating(object.get("rating")),
        category: normalize_category(object.get("category")),
        tags,
        key_findings,
    }
}

/// Clamp into `1..=10`; anything missing or non-numeric becomes 5.
///
/// Fractional ratings round to the nearest integer. Numeric strings such as
/// `"8"` are accepted.
pub fn normalize_rating(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n
            .round()
            .clamp(f64::from(MIN_RATING), f64::from(MAX_RATING)) as u8,
        _ => DEFAULT_RATING,
    }
}

/// Map to one of the fixed categories, or [`Category::Other`].
pub fn normalize_category(value: Option<&Value>) -> Category {
    value
        .and_then(Value::as_str)
        .and_then(Category::from_name)
        .unwrap_or(Category::Other)
}

/// Strings from a JSON array; non-strings and blanks are dropped, anything
/// that is not an array yields an empty list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYLOAD: &str = r#"{"summary": "A new method.", "rating": 8, "category": "Physics", "tags": ["optics", "lasers"], "keyFindings": ["It works."]}"#;

    #[test]
    fn all_three_paths_agree() {
        let bare = normalize_analysis(PAYLOAD).unwrap();
        let fenced = normalize_analysis(&format!("```json\n{PAYLOAD}\n```")).unwrap();
        let untagged = normalize_analysis(&format!("```\n{PAYLOAD}\n```")).unwrap();
        let prose =
            normalize_analysis(&format!("Sure! Here is the analysis: {PAYLOAD} Hope it helps."))
                .unwrap();

        assert_eq!(bare, fenced);
        assert_eq!(bare, untagged);
        assert_eq!(bare, prose);
        assert_eq!(bare.rating, 8);
        assert_eq!(bare.category, Category::Physics);
        assert_eq!(bare.tags, vec!["optics", "lasers"]);
        assert_eq!(bare.key_findings, vec!["It works."]);
    }

    #[test]
    fn fenced_reply_with_out_of_range_fields() {
        let raw = "Here you go:\n```json\n{\"rating\": 12, \"category\": \"Xyz\"}\n```";
        let a = normalize_analysis(raw).unwrap();
        assert_eq!(
            a,
            PaperAnalysis {
                summary: String::new(),
                rating: 10,
                category: Category::Other,
                tags: vec![],
                key_findings: vec![],
            }
        );
    }

    #[test]
    fn rating_normalisation_table() {
        let cases = [
            (json!(0), 1),
            (json!(1), 1),
            (json!(10), 10),
            (json!(11), 10),
            (json!("nine"), 5),
            (Value::Null, 5),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_rating(Some(&input)), expected, "input {input}");
        }
        assert_eq!(normalize_rating(None), 5);
        assert_eq!(normalize_rating(Some(&json!("7"))), 7);
        assert_eq!(normalize_rating(Some(&json!(6.6))), 7);
        assert_eq!(normalize_rating(Some(&json!(-3))), 1);
        assert_eq!(normalize_rating(Some(&json!([8]))), 5);
    }

    #[test]
    fn category_normalisation() {
        assert_eq!(normalize_category(Some(&json!("Astrology"))), Category::Other);
        assert_eq!(normalize_category(Some(&json!("Biology"))), Category::Biology);
        assert_eq!(
            normalize_category(Some(&json!("Environmental Science"))).as_str(),
            "Environmental Science"
        );
        assert_eq!(normalize_category(Some(&json!(3))), Category::Other);
        assert_eq!(normalize_category(None), Category::Other);
    }

    #[test]
    fn non_sequence_lists_default_to_empty() {
        let a = normalize_analysis(r#"{"tags": "ml", "keyFindings": {"a": 1}, "summary": 4}"#)
            .unwrap();
        assert!(a.tags.is_empty());
        assert!(a.key_findings.is_empty());
        assert_eq!(a.summary, "");
    }

    #[test]
    fn tags_capped_and_non_strings_dropped() {
        let a = normalize_analysis(
            r#"{"tags": ["a", 1, "b", "", "c", "d", "e", "f", "g", "h", "i"], "key_findings": ["snake"]}"#,
        )
        .unwrap();
        assert_eq!(a.tags, vec!["a", "b", "c", "d", "e", "f", "g", "h"]);
        assert_eq!(a.key_findings, vec!["snake"]);
    }

    #[test]
    fn no_json_is_an_error() {
        assert_eq!(
            normalize_analysis("I cannot analyse this paper."),
            Err(ParseError::NoJsonFound)
        );
        assert_eq!(normalize_analysis("} backwards {"), Err(ParseError::NoJsonFound));
        assert_eq!(normalize_analysis(""), Err(ParseError::NoJsonFound));
    }

    #[test]
    fn json_array_is_not_an_analysis() {
        assert_eq!(normalize_analysis("[1, 2, 3]"), Err(ParseError::NoJsonFound));
    }

    #[test]
    fn broken_fence_falls_back_to_brace_span() {
        let raw = "```json\n{\"rating\": 3,}\n```\nActually: {\"rating\": 4}";
        // The fenced body has a trailing comma; the brace span covers both
        // objects and is invalid too.
        assert_eq!(normalize_analysis(raw), Err(ParseError::NoJsonFound));

        let raw = "```\nnot json\n```\n{\"rating\": 4}";
        assert_eq!(normalize_analysis(raw).unwrap().rating, 4);
    }
}
