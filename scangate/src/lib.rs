pub mod artifact;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod output;
pub mod poll;
pub mod result;
pub mod trigger;

use tracing::info;

use artifact::ResultSink;
use client::{ApiiroClient, Transport};
use config::{ClientConfig, PollSettings};
use endpoint::Endpoint;
use poll::{PollError, PollOutcome, Poller};
use trigger::{BuildScanRequest, DiffScanRequest, TriggerError};

/// Entry point tying the API client to the trigger and poll operations.
pub struct ScanGate {
    transport: Box<dyn Transport>,
}

impl ScanGate {
    pub fn new(config: &ClientConfig) -> reqwest::Result<Self> {
        let client = ApiiroClient::new(config)?;
        Ok(Self::with_transport(client))
    }

    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    pub async fn trigger_build_scan(
        &self,
        commit_sha: &str,
        repository_url: &str,
    ) -> Result<String, TriggerError> {
        let request = BuildScanRequest {
            commit_sha,
            repository_url,
        };
        trigger::trigger_build_scan(self.transport.as_ref(), &request).await
    }

    pub async fn trigger_diff_scan(
        &self,
        repository_url: &str,
        current_branch: &str,
        default_branch: &str,
    ) -> Result<String, TriggerError> {
        let request = DiffScanRequest::branches(repository_url, current_branch, default_branch);
        trigger::trigger_diff_scan(self.transport.as_ref(), &request).await
    }

    /// Poll `endpoint` for scan `id` until it passes, fails, or the budget runs out.
    pub async fn await_results(
        &self,
        endpoint: Endpoint,
        id: &str,
        settings: PollSettings,
        sink: Option<&dyn ResultSink>,
    ) -> Result<PollOutcome, PollError> {
        info!(
            %endpoint,
            id,
            interval = ?settings.poll_interval(),
            max_wait = ?settings.max_wait(),
            "polling for scan results"
        );
        let mut poller = Poller::new(self.transport.as_ref(), settings);
        if let Some(sink) = sink {
            poller = poller.sink(sink);
        }
        poller
            .poll_until_terminal(&endpoint.status_path(id), &endpoint)
            .await
    }
}
