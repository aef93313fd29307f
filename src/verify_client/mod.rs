//! VerifyClient - HTTP client for the check-in server
//!
//! ## Responsibilities
//!
//! - `POST /verify-ticket` with the decoded or typed identifier
//! - `PUT /join/accept/{id}` for staff acceptance
//! - Classify transport, client and server failures onto `ErrorKind`
//!
//! A 200 with `registered: false` is a negative result, not a failure.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::application_service::AcceptResult;
use crate::models::ErrorKind;
use crate::verification_service::{VerificationResult, Verifier, VerifyError, VerifyRequest};

/// Default request timeout (10 seconds)
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Non-verification request failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RequestError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ErrorKind::NetworkError,
            message: e.to_string(),
        }
    }
}

/// Map an HTTP error status to the failure taxonomy
pub fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST => ErrorKind::InvalidIdentifier,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        _ => ErrorKind::ServerError,
    }
}

/// HTTP client for the check-in server
#[derive(Clone)]
pub struct VerifyClient {
    client: reqwest::Client,
    base_url: String,
}

impl VerifyClient {
    /// Create a client with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, RequestError> {
        Self::with_timeout(base_url, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RequestError::network)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verify an identifier
    pub async fn verify_identifier(&self, identifier: &str) -> Result<VerificationResult, VerifyError> {
        let url = format!("{}/verify-ticket", self.base_url);
        let body = VerifyRequest {
            identifier: identifier.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VerifyError::Network(e.to_string()))?;

        let status = response.status();
        tracing::debug!(status = %status, "Verify response received");

        if status.is_success() {
            return response
                .json::<VerificationResult>()
                .await
                .map_err(|e| VerifyError::Server(format!("malformed verify response: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        match status {
            StatusCode::BAD_REQUEST => Err(VerifyError::InvalidIdentifier(error_message(&text, status))),
            // Some deployments answer an unknown identifier with 404 and a result body
            StatusCode::NOT_FOUND => serde_json::from_str::<VerificationResult>(&text)
                .map_err(|_| VerifyError::Server(format!("unexpected 404 from {}", url))),
            _ => Err(VerifyError::Server(error_message(&text, status))),
        }
    }

    /// Accept a pending application
    pub async fn accept(&self, application_id: &str) -> Result<AcceptResult, RequestError> {
        let url = format!(
            "{}/join/accept/{}",
            self.base_url,
            urlencoding::encode(application_id)
        );

        let response = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(RequestError::network)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<AcceptResult>().await.map_err(|e| RequestError {
                kind: ErrorKind::ServerError,
                message: format!("malformed accept response: {}", e),
            });
        }

        let text = response.text().await.unwrap_or_default();
        Err(RequestError {
            kind: classify_status(status),
            message: error_message(&text, status),
        })
    }

    /// Check server health
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Health check failed");
                false
            }
        }
    }
}

fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

impl Verifier for VerifyClient {
    async fn verify(&self, identifier: &str) -> Result<VerificationResult, VerifyError> {
        self.verify_identifier(identifier).await
    }
}
