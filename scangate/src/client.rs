use std::error::Error as _;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The request never produced a response: connection refused, DNS, per-attempt timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::new(url, "timed out");
        }
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(url, message)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError>;
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        content_type: &str,
    ) -> Result<HttpResponse, TransportError>;
}

/// Bearer-authenticated client for the scan REST API.
#[derive(Clone)]
pub struct ApiiroClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiiroClient {
    pub fn new(config: &ClientConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("scangate")
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read(url: &str, response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;
        debug!(%status, %body, "received response");
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for ApiiroClient {
    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, e))?;
        Self::read(&url, response).await
    }

    #[instrument(skip(self, body))]
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        content_type: &str,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, e))?;
        Self::read(&url, response).await
    }
}
