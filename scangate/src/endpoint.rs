use std::fmt;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::poll::{Classification, Classify, Pending, PollError, PollOutcome};
use crate::result::{BuildScanResult, DiffScanResult};

/// The two scan kinds the API exposes, each with its own status path and verdict rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    BuildScan,
    DiffScan,
}

impl Endpoint {
    pub fn status_path(&self, id: &str) -> String {
        match self {
            Endpoint::BuildScan => format!("/rest-api/v2/buildScan/{id}/results"),
            Endpoint::DiffScan => format!("/rest-api/v1/diffScans/{id}"),
        }
    }

    pub fn trigger_path(&self) -> &'static str {
        match self {
            Endpoint::BuildScan => "/rest-api/v1/buildScan/builds",
            Endpoint::DiffScan => "/rest-api/v1/diffScans",
        }
    }

    pub fn trigger_content_type(&self) -> &'static str {
        match self {
            Endpoint::BuildScan => "application/json-patch+json",
            Endpoint::DiffScan => "application/json",
        }
    }

    /// Diff scan jobs 404 until the scanner picks them up.
    pub fn not_found_is_pending(&self) -> bool {
        matches!(self, Endpoint::DiffScan)
    }

    pub fn default_artifact(&self) -> &'static str {
        match self {
            Endpoint::BuildScan => "build_scan_results.json",
            Endpoint::DiffScan => "diff_scan_results.json",
        }
    }

    /// Key used when publishing a triggered scan's id to the CI output file.
    pub fn output_key(&self) -> &'static str {
        match self {
            Endpoint::BuildScan => "build_id",
            Endpoint::DiffScan => "job_id",
        }
    }

    pub fn judge(&self, payload: Value) -> Result<PollOutcome, PollError> {
        match self {
            Endpoint::BuildScan => {
                if BuildScanResult::from_payload(&payload)?.build_passed {
                    Ok(PollOutcome::Success { payload })
                } else {
                    Ok(PollOutcome::Failure {
                        payload,
                        reason: "buildPassed is false".to_string(),
                        blocking: vec![],
                    })
                }
            }
            Endpoint::DiffScan => {
                if !DiffScanResult::is_blocked(&payload) {
                    return Ok(PollOutcome::Success { payload });
                }
                let result = DiffScanResult::from_payload(&payload);
                Ok(PollOutcome::Failure {
                    blocking: result.blocking_changes(),
                    reason: result
                        .summary
                        .unwrap_or_else(|| "result is Block".to_string()),
                    payload,
                })
            }
        }
    }
}

impl Classify for Endpoint {
    fn classify(&self, status: StatusCode, body: &str) -> Result<Classification, PollError> {
        match status {
            StatusCode::OK => {
                let payload: Value = serde_json::from_str(body)?;
                self.judge(payload).map(Classification::Terminal)
            }
            StatusCode::SERVICE_UNAVAILABLE => Ok(Classification::Pending(Pending::Running)),
            StatusCode::NOT_FOUND if self.not_found_is_pending() => {
                Ok(Classification::Pending(Pending::NotStarted))
            }
            status => Err(PollError::UnexpectedStatus {
                status,
                body: body.to_string(),
            }),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::BuildScan => write!(f, "build scan"),
            Endpoint::DiffScan => write!(f, "diff scan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(endpoint: Endpoint, body: &str) -> PollOutcome {
        match endpoint.classify(StatusCode::OK, body).unwrap() {
            Classification::Terminal(outcome) => outcome,
            Classification::Pending(p) => panic!("expected terminal, got pending {p:?}"),
        }
    }

    #[test]
    fn status_paths() {
        assert_eq!(
            Endpoint::BuildScan.status_path("b-1"),
            "/rest-api/v2/buildScan/b-1/results"
        );
        assert_eq!(Endpoint::DiffScan.status_path("j-1"), "/rest-api/v1/diffScans/j-1");
    }

    #[test]
    fn trigger_paths() {
        assert_eq!(Endpoint::BuildScan.trigger_path(), "/rest-api/v1/buildScan/builds");
        assert_eq!(Endpoint::DiffScan.trigger_path(), "/rest-api/v1/diffScans");
    }

    #[test]
    fn build_scan_pass_and_fail() {
        assert!(outcome(Endpoint::BuildScan, r#"{"buildPassed": true}"#).passed());
        assert!(!outcome(Endpoint::BuildScan, r#"{"buildPassed": false}"#).passed());
    }

    #[test]
    fn build_scan_missing_flag_is_parse_error() {
        let err = Endpoint::BuildScan
            .classify(StatusCode::OK, r#"{"summary": "ok"}"#)
            .err()
            .expect("should be an error");
        assert!(matches!(err, PollError::Parse(_)));
    }

    #[test]
    fn diff_scan_block_fails_with_summary() {
        let got = outcome(
            Endpoint::DiffScan,
            r#"{"result": "Block", "summary": "Policy violated",
                "materialChanges": [{"action": "Block", "count": 2, "label": "Secrets"}]}"#,
        );
        match got {
            PollOutcome::Failure {
                reason, blocking, ..
            } => {
                assert_eq!(reason, "Policy violated");
                assert_eq!(blocking[0].to_string(), "Secrets: 2 issues");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn diff_scan_block_with_odd_details_still_fails() {
        let got = outcome(Endpoint::DiffScan, r#"{"result": "Block", "materialChanges": 7}"#);
        match got {
            PollOutcome::Failure {
                reason, blocking, ..
            } => {
                assert_eq!(reason, "result is Block");
                assert!(blocking.is_empty());
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn diff_scan_block_keeps_readable_details() {
        let got = outcome(
            Endpoint::DiffScan,
            r#"{"result": "Block", "summary": "Policy violated",
                "materialChanges": [
                    {"action": "Block", "count": 2, "label": "Secrets"},
                    {"action": "Notify", "count": null, "label": "New APIs"}
                ]}"#,
        );
        match got {
            PollOutcome::Failure {
                reason, blocking, ..
            } => {
                assert_eq!(reason, "Policy violated");
                assert_eq!(blocking.len(), 1);
                assert_eq!(blocking[0].to_string(), "Secrets: 2 issues");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn diff_scan_anything_but_block_passes() {
        for body in [r#"{"result": "Allow"}"#, r#"{"result": null}"#, "{}", "[]"] {
            assert!(outcome(Endpoint::DiffScan, body).passed(), "{body}");
        }
    }

    #[test]
    fn success_keeps_raw_payload() {
        let got = outcome(Endpoint::DiffScan, r#"{"result": "Allow", "extra": [1, 2]}"#);
        assert_eq!(got.payload(), &json!({"result": "Allow", "extra": [1, 2]}));
    }

    #[test]
    fn service_unavailable_is_pending_everywhere() {
        for endpoint in [Endpoint::BuildScan, Endpoint::DiffScan] {
            assert!(matches!(
                endpoint.classify(StatusCode::SERVICE_UNAVAILABLE, ""),
                Ok(Classification::Pending(Pending::Running))
            ));
        }
    }

    #[test]
    fn not_found_depends_on_endpoint() {
        assert!(matches!(
            Endpoint::DiffScan.classify(StatusCode::NOT_FOUND, ""),
            Ok(Classification::Pending(Pending::NotStarted))
        ));
        assert!(matches!(
            Endpoint::BuildScan.classify(StatusCode::NOT_FOUND, ""),
            Err(PollError::UnexpectedStatus { .. })
        ));
    }

    #[test]
    fn other_statuses_are_fatal() {
        for code in [201, 202, 401, 403, 500] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = Endpoint::DiffScan
                .classify(status, "nope")
                .err()
                .expect("should be an error");
            assert_eq!(
                err.to_string(),
                format!("API request failed with status {status}: nope")
            );
        }
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            Endpoint::DiffScan.classify(StatusCode::OK, "<html>"),
            Err(PollError::Parse(_))
        ));
    }

    #[test]
    fn display_and_serialize() {
        assert_eq!(Endpoint::BuildScan.to_string(), "build scan");
        assert_eq!(serde_json::to_value(Endpoint::DiffScan).unwrap(), json!("diff_scan"));
    }
}
