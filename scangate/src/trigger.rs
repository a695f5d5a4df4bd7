use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::client::{Transport, TransportError};
use crate::endpoint::Endpoint;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("API request failed with status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("API returned an empty {0} id")]
    EmptyId(Endpoint),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildScanRequest<'a> {
    pub commit_sha: &'a str,
    pub repository_url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffScanRequest<'a> {
    pub repository_url: &'a str,
    pub candidate: Commitish<'a>,
    pub baseline: Commitish<'a>,
}

impl<'a> DiffScanRequest<'a> {
    /// Compare `candidate_branch` against `baseline_branch`.
    pub fn branches(
        repository_url: &'a str,
        candidate_branch: &'a str,
        baseline_branch: &'a str,
    ) -> Self {
        Self {
            repository_url,
            candidate: Commitish::branch(candidate_branch),
            baseline: Commitish::branch(baseline_branch),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Commitish<'a> {
    pub commitish: &'a str,
    #[serde(rename = "type")]
    pub kind: CommitishKind,
}

impl<'a> Commitish<'a> {
    pub fn branch(name: &'a str) -> Self {
        Self {
            commitish: name,
            kind: CommitishKind::Branch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommitishKind {
    Branch,
}

#[instrument(skip(transport, request), fields(commit = %short_sha(request.commit_sha)))]
pub async fn trigger_build_scan(
    transport: &dyn Transport,
    request: &BuildScanRequest<'_>,
) -> Result<String, TriggerError> {
    info!(repository = request.repository_url, "triggering build scan");
    submit(transport, Endpoint::BuildScan, serde_json::to_value(request)?).await
}

#[instrument(skip(transport, request))]
pub async fn trigger_diff_scan(
    transport: &dyn Transport,
    request: &DiffScanRequest<'_>,
) -> Result<String, TriggerError> {
    info!(
        repository = request.repository_url,
        candidate = request.candidate.commitish,
        baseline = request.baseline.commitish,
        "triggering diff scan"
    );
    submit(transport, Endpoint::DiffScan, serde_json::to_value(request)?).await
}

/// The API answers a trigger with the new scan's id as plain text.
async fn submit(
    transport: &dyn Transport,
    endpoint: Endpoint,
    body: serde_json::Value,
) -> Result<String, TriggerError> {
    let response = transport
        .post_json(endpoint.trigger_path(), &body, endpoint.trigger_content_type())
        .await?;

    if response.status != StatusCode::OK {
        return Err(TriggerError::UnexpectedStatus {
            status: response.status,
            body: response.body,
        });
    }

    let id = response.body.trim();
    if id.is_empty() {
        return Err(TriggerError::EmptyId(endpoint));
    }
    info!(%endpoint, id, "scan triggered");
    Ok(id.to_string())
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
