use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::artifact::ResultSink;
use crate::client::{Transport, TransportError};
use crate::config::PollSettings;
use crate::result::MaterialChange;

/// Why a scan is not finished yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    /// HTTP 503: the scan is still running.
    Running,
    /// HTTP 404 on an endpoint where jobs appear some time after triggering.
    NotStarted,
    /// No response at all, retried only when configured.
    Unreachable,
}

impl fmt::Display for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Running => write!(f, "scan still in progress"),
            Pending::NotStarted => write!(f, "scan job not found, it may not have started yet"),
            Pending::Unreachable => write!(f, "scan API unreachable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Success {
        payload: Value,
    },
    Failure {
        payload: Value,
        reason: String,
        blocking: Vec<MaterialChange>,
    },
}

impl PollOutcome {
    pub fn payload(&self) -> &Value {
        match self {
            PollOutcome::Success { payload } | PollOutcome::Failure { payload, .. } => payload,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, PollOutcome::Success { .. })
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("API request failed with status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("failed to parse scan result: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{}", timeout_message(.attempts, .last))]
    TimedOut { attempts: u32, last: Option<Pending> },
}

fn timeout_message(attempts: &u32, last: &Option<Pending>) -> String {
    match last {
        Some(Pending::NotStarted) => {
            format!("scan job was never found after {attempts} attempts")
        }
        _ => format!("scan did not complete within {attempts} attempts"),
    }
}

pub enum Classification {
    Terminal(PollOutcome),
    Pending(Pending),
}

/// Maps one status response to a verdict, a reason to keep waiting, or a fatal error.
pub trait Classify: Send + Sync {
    fn classify(&self, status: StatusCode, body: &str) -> Result<Classification, PollError>;
}

/// Fixed-cadence poll loop over a [`Transport`].
pub struct Poller<'a> {
    transport: &'a dyn Transport,
    settings: PollSettings,
    sink: Option<&'a dyn ResultSink>,
}

impl<'a> Poller<'a> {
    pub fn new(transport: &'a dyn Transport, settings: PollSettings) -> Self {
        Self {
            transport,
            settings,
            sink: None,
        }
    }

    /// Persist every terminal payload, pass or fail.
    pub fn sink(mut self, sink: &'a dyn ResultSink) -> Self {
        self.sink = Some(sink);
        self
    }

    #[instrument(skip(self, classifier), fields(max_attempts = self.settings.max_attempts()))]
    pub async fn poll_until_terminal(
        &self,
        path: &str,
        classifier: &dyn Classify,
    ) -> Result<PollOutcome, PollError> {
        let max_attempts = self.settings.max_attempts();
        let mut last = None;

        for attempt in 1..=max_attempts {
            info!("checking scan status (attempt {attempt}/{max_attempts})");

            let pending = match self.transport.get(path).await {
                Ok(response) => match classifier.classify(response.status, &response.body)? {
                    Classification::Terminal(outcome) => {
                        self.persist(outcome.payload());
                        return Ok(outcome);
                    }
                    Classification::Pending(pending) => pending,
                },
                Err(e) if self.settings.retries_transport_errors() => {
                    warn!(error = %e, "request failed, retrying");
                    Pending::Unreachable
                }
                Err(e) => return Err(e.into()),
            };

            info!(attempt, "{pending}");
            last = Some(pending);

            if attempt < max_attempts {
                tokio::time::sleep(self.settings.poll_interval()).await;
            }
        }

        Err(PollError::TimedOut {
            attempts: max_attempts,
            last,
        })
    }

    fn persist(&self, payload: &Value) {
        let Some(sink) = self.sink else {
            return;
        };
        match sink.store(payload) {
            Ok(()) => info!(sink = %sink.describe(), "scan results saved"),
            Err(e) => warn!(sink = %sink.describe(), error = %e, "could not save results"),
        }
    }
}
