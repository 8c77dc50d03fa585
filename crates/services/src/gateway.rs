//! Request/response calls to the analysis backend.
//!
//! The submission call starts an analysis job and returns the session id
//! the streaming controller needs; the preview call fetches a displayable
//! image reference for the submitted page. Both are plain one-shot
//! requests with no retries.

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::SubmitError;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
}

impl GatewayConfig {
    /// Read the backend base URL from `SITEQUIZ_BASE_URL`, falling back to
    /// the local development backend.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env::var("SITEQUIZ_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".into());
        Self { base_url }
    }
}

/// Response of a successful submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionResponse {
    pub session_id: String,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewImageResponse {
    pub image: String,
}

/// Seam over the backend's request/response endpoints, so workflows can be
/// exercised without a live backend.
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Start an analysis job for `url` (already scheme-qualified).
    async fn generate_content(&self, url: &str) -> Result<SubmissionResponse, SubmitError>;

    /// Fetch a preview image reference for `url`. Callers render a
    /// placeholder when this fails; there are no retries.
    async fn preview_image(&self, url: &str) -> Result<PreviewImageResponse, SubmitError>;
}

#[derive(Clone)]
pub struct SubmissionGateway {
    client: Client,
    config: GatewayConfig,
}

impl SubmissionGateway {
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GatewayConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SubmissionApi for SubmissionGateway {
    async fn generate_content(&self, url: &str) -> Result<SubmissionResponse, SubmitError> {
        let response = self
            .client
            .get(self.endpoint("generate-content/"))
            .query(&[("url", url)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SubmitError::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }

    async fn preview_image(&self, url: &str) -> Result<PreviewImageResponse, SubmitError> {
        let response = self
            .client
            .get(self.endpoint("preview-img/"))
            .query(&[("url", url)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SubmitError::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }
}
