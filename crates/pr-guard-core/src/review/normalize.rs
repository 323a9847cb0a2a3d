use serde_json::Value;
use tracing::debug;

use super::Finding;

/// Findings below this confidence are dropped during normalization.
pub const MIN_CONFIDENCE: f64 = 0.7;

/// Locate the first well-formed JSON array in the model's response text.
///
/// Completion endpoints return plain JSON on a good day and JSON wrapped in
/// prose or a markdown fence otherwise; both shapes must parse.
pub fn extract_json_array(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if value.is_array() {
            return Some(value);
        }
    }

    for (idx, _) in text.char_indices().filter(|(_, ch)| *ch == '[') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_array() {
                return Some(value);
            }
        }
    }
    None
}

/// Filter raw model findings down to the ones worth keeping and stamp the
/// source filename on each survivor.
///
/// Findings with `confidence < MIN_CONFIDENCE` are dropped; input order is
/// preserved and no other field is touched. A list that does not deserialize
/// as findings yields an empty result; malformed model output must never
/// abort a scan.
pub fn normalize_findings(raw: Value, filename: &str) -> Vec<Finding> {
    let mut findings: Vec<Finding> = match serde_json::from_value(raw) {
        Ok(findings) => findings,
        Err(err) => {
            debug!(file = filename, error = %err, "discarding malformed finding list");
            return Vec::new();
        }
    };

    findings.retain(|finding| finding.confidence >= MIN_CONFIDENCE);
    for finding in &mut findings {
        finding.file = filename.to_string();
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{test_support, Severity};
    use proptest::prelude::*;
    use serde_json::json;

    fn raw_findings(confidences: &[f64]) -> Value {
        Value::Array(
            confidences
                .iter()
                .map(|confidence| {
                    let mut finding =
                        serde_json::to_value(test_support::finding(Severity::High, *confidence))
                            .unwrap();
                    finding["file"] = json!("from-the-model.rs");
                    finding
                })
                .collect(),
        )
    }

    #[test]
    fn drops_low_confidence_findings() {
        let normalized = normalize_findings(raw_findings(&[0.9, 0.3, 0.7, 0.69]), "api/auth.py");
        let confidences: Vec<f64> = normalized.iter().map(|f| f.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7]);
    }

    #[test]
    fn stamps_filename_on_every_survivor() {
        let normalized = normalize_findings(raw_findings(&[0.8, 0.95]), "api/auth.py");
        assert_eq!(normalized.len(), 2);
        assert!(normalized.iter().all(|f| f.file == "api/auth.py"));
    }

    #[test]
    fn malformed_list_yields_empty() {
        for raw in [
            json!({"findings": "nope"}),
            json!([{"type": "X"}]),
            json!([1, 2, 3]),
            json!("not even close"),
        ] {
            assert!(normalize_findings(raw, "a.rs").is_empty());
        }
    }

    #[test]
    fn empty_list_yields_empty() {
        assert!(normalize_findings(json!([]), "a.rs").is_empty());
    }

    #[test]
    fn extracts_plain_json_array() {
        let value = extract_json_array(r#"[{"a": 1}]"#).unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn extracts_array_from_markdown_fence() {
        let text = "Here is what I found:\n```json\n[{\"a\": 1}, {\"a\": 2}]\n```\nLet me know!";
        let value = extract_json_array(text).unwrap();
        assert_eq!(value, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn extracts_first_array_when_several_present() {
        let text = "first [1, 2] then [3, 4]";
        assert_eq!(extract_json_array(text).unwrap(), json!([1, 2]));
    }

    #[test]
    fn skips_non_array_json() {
        assert!(extract_json_array(r#"{"findings": []}"#).is_none());
        assert!(extract_json_array("no json here").is_none());
        assert!(extract_json_array("unbalanced [1, 2").is_none());
    }

    proptest! {
        #[test]
        fn only_confident_findings_survive(
            confidences in proptest::collection::vec(0.0f64..=1.0, 0..24)
        ) {
            let normalized = normalize_findings(raw_findings(&confidences), "lib/core.rb");
            let expected = confidences.iter().filter(|c| **c >= MIN_CONFIDENCE).count();
            prop_assert_eq!(normalized.len(), expected);
            prop_assert!(normalized.iter().all(|f| f.confidence >= MIN_CONFIDENCE));
            prop_assert!(normalized.iter().all(|f| f.file == "lib/core.rb"));
        }
    }
}
