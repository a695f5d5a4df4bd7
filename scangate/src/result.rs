//! Typed views over scan result payloads.
//!
//! The raw payload is kept as a [`Value`] for the artifact; these structs only
//! pick out the fields a verdict or a report needs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

const BLOCK: &str = "Block";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildScanResult {
    pub build_passed: bool,
}

impl BuildScanResult {
    /// Fails when `buildPassed` is missing, null, or not a boolean.
    pub fn from_payload(payload: &Value) -> serde_json::Result<Self> {
        Self::deserialize(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MaterialChange {
    #[serde(default)]
    pub action: String,
    #[serde(default, deserialize_with = "whole_number")]
    pub count: i64,
    #[serde(default)]
    pub label: String,
}

impl MaterialChange {
    pub fn is_blocking(&self) -> bool {
        self.action == BLOCK && self.count > 0
    }
}

impl fmt::Display for MaterialChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} issues", self.label, self.count)
    }
}

/// Accepts `2` as well as `2.0`.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let n = serde_json::Number::deserialize(deserializer)?;
    n.as_i64()
        .or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                .map(|f| f as i64)
        })
        .ok_or_else(|| serde::de::Error::custom(format!("count {n} is not a whole number")))
}

/// Link to the scan in the Apiiro UI, if the payload carries one.
pub fn scan_url(payload: &Value) -> Option<String> {
    text_field(payload, "scanUrl")
}

fn text_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(String::from)
}

/// Detail fields of a diff scan payload. Each field is read on its own, so a
/// malformed one never hides the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffScanResult {
    pub summary: Option<String>,
    pub material_changes: Vec<MaterialChange>,
}

impl DiffScanResult {
    pub fn from_payload(payload: &Value) -> Self {
        let material_changes = payload
            .get("materialChanges")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| match MaterialChange::deserialize(entry) {
                Ok(change) => Some(change),
                Err(e) => {
                    warn!(error = %e, %entry, "skipping unreadable material change");
                    None
                }
            })
            .collect();

        Self {
            summary: text_field(payload, "summary"),
            material_changes,
        }
    }

    /// Only an explicit `"Block"` result fails the scan.
    pub fn is_blocked(payload: &Value) -> bool {
        payload.get("result").and_then(Value::as_str) == Some(BLOCK)
    }

    pub fn blocking_changes(&self) -> Vec<MaterialChange> {
        self.material_changes
            .iter()
            .filter(|c| c.is_blocking())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_result_reads_flag() {
        let passed = BuildScanResult::from_payload(&json!({"buildPassed": true})).unwrap();
        assert!(passed.build_passed);
        let failed = BuildScanResult::from_payload(&json!({"buildPassed": false})).unwrap();
        assert!(!failed.build_passed);
    }

    #[test]
    fn build_result_requires_flag() {
        let err = BuildScanResult::from_payload(&json!({"status": "done"})).unwrap_err();
        assert!(err.to_string().contains("buildPassed"), "got: {err}");
        assert!(BuildScanResult::from_payload(&json!({"buildPassed": null})).is_err());
        assert!(BuildScanResult::from_payload(&json!({"buildPassed": "yes"})).is_err());
    }

    #[test]
    fn block_result_is_blocked() {
        assert!(DiffScanResult::is_blocked(&json!({"result": "Block"})));
    }

    #[test]
    fn other_results_are_not_blocked() {
        assert!(!DiffScanResult::is_blocked(&json!({"result": "Allow"})));
        assert!(!DiffScanResult::is_blocked(&json!({"result": "block"})));
        assert!(!DiffScanResult::is_blocked(&json!({"result": 3})));
        assert!(!DiffScanResult::is_blocked(&json!({})));
        assert!(!DiffScanResult::is_blocked(&json!([])));
    }

    #[test]
    fn blocking_changes_filters_action_and_count() {
        let payload = json!({
            "result": "Block",
            "summary": "2 policies violated",
            "scanUrl": "https://app.example.com/scans/9",
            "materialChanges": [
                {"action": "Block", "count": 2, "label": "Secrets"},
                {"action": "Block", "count": 0, "label": "Licenses"},
                {"action": "Notify", "count": 5, "label": "New APIs"},
                {"action": "Block", "count": 1, "label": "SAST"}
            ]
        });
        let result = DiffScanResult::from_payload(&payload);
        assert_eq!(result.summary.as_deref(), Some("2 policies violated"));
        assert_eq!(scan_url(&payload).as_deref(), Some("https://app.example.com/scans/9"));

        let blocking: Vec<String> = result
            .blocking_changes()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(blocking, vec!["Secrets: 2 issues", "SAST: 1 issues"]);
    }

    #[test]
    fn missing_or_null_changes_yield_nothing() {
        let absent = DiffScanResult::from_payload(&json!({"result": "Block"}));
        assert!(absent.blocking_changes().is_empty());
        let null = DiffScanResult::from_payload(&json!({"materialChanges": null}));
        assert!(null.blocking_changes().is_empty());
    }

    #[test]
    fn change_fields_default_when_absent() {
        let result =
            DiffScanResult::from_payload(&json!({"materialChanges": [{"action": "Block"}]}));
        assert_eq!(result.material_changes.len(), 1);
        assert!(result.blocking_changes().is_empty());
    }

    #[test]
    fn unreadable_changes_are_skipped_individually() {
        let result = DiffScanResult::from_payload(&json!({
            "summary": "Policy violated",
            "materialChanges": [
                {"action": "Block", "count": 2, "label": "Secrets"},
                {"action": "Notify", "count": null, "label": "New APIs"},
                {"action": "Block", "count": 1.5, "label": "SAST"},
                "garbage"
            ]
        }));
        assert_eq!(result.summary.as_deref(), Some("Policy violated"));
        let blocking: Vec<String> = result
            .blocking_changes()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(blocking, vec!["Secrets: 2 issues"]);
    }

    #[test]
    fn integral_float_count_is_accepted() {
        let result = DiffScanResult::from_payload(&json!({
            "materialChanges": [{"action": "Block", "count": 2.0, "label": "Secrets"}]
        }));
        assert_eq!(result.blocking_changes()[0].to_string(), "Secrets: 2 issues");
    }

    #[test]
    fn non_string_summary_is_ignored_alone() {
        let result = DiffScanResult::from_payload(&json!({
            "summary": 42,
            "scanUrl": ["not", "a", "url"],
            "materialChanges": [{"action": "Block", "count": 3, "label": "Licenses"}]
        }));
        assert_eq!(result.summary, None);
        assert_eq!(result.blocking_changes().len(), 1);
        assert_eq!(scan_url(&json!({"scanUrl": 9})), None);
    }
}
