//! Renewal client for the campusdesk REST backend.
//!
//! The backend issues short-lived access credentials and longer-lived
//! refresh credentials. This module exchanges a refresh credential for a
//! fresh access credential via the token renewal endpoint.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the token renewal endpoint, relative to the API base URL.
const RENEWAL_PATH: &str = "/api/token/refresh/";

/// HTTP request timeout in seconds.
/// Bounds the renewal call so a hung request resolves as a failure instead
/// of stalling the session guard indefinitely.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct RenewalRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenewalResponse {
    access: String,
}

/// A single-call credential exchange: refresh credential in, new access
/// credential out. Abstracted so the session guard can be driven by a
/// scripted client in tests.
pub trait RenewalClient: Send + Sync {
    fn renew(&self, refresh: &str)
        -> impl Future<Output = Result<String, ApiError>> + Send;
}

/// Renewal client backed by the campusdesk REST backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpRenewalClient {
    client: Client,
    base_url: String,
}

impl HttpRenewalClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn renewal_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), RENEWAL_PATH)
    }
}

impl RenewalClient for HttpRenewalClient {
    async fn renew(&self, refresh: &str) -> Result<String, ApiError> {
        let url = self.renewal_url();

        let response = self
            .client
            .post(&url)
            .json(&RenewalRequest { refresh })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "credential renewal rejected");
            return Err(ApiError::from_status(status, &body));
        }

        let parsed: RenewalResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        debug!("credential renewal succeeded");
        Ok(parsed.access)
    }
}
