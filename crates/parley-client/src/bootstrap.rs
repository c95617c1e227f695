//! REST bootstrap client: session create, history fetch, and reset.
//!
//! A thin request/response layer over the backend's bootstrap endpoints.
//! Calls are never retried here; failures are surfaced to the coordinator,
//! which exposes them to the presentation layer.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_core::{Message, SessionId};

use crate::errors::BootstrapError;

/// Request/response client for the session bootstrap interface.
pub struct BootstrapClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    history: Vec<Message>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl BootstrapClient {
    /// Client for the given REST base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BootstrapError> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.into(),
            timeout,
        })
    }

    /// Create a fresh session. Returns its id.
    pub async fn create_session(&self) -> Result<SessionId, BootstrapError> {
        debug!("creating session");
        let response = self
            .http
            .post(format!("{}/chat/session", self.base_url))
            .timeout(self.timeout)
            .json(&SessionRequest { session_id: None })
            .send()
            .await?;
        Self::session_id_from(response).await
    }

    /// Fetch the session's prior message history, in display order.
    pub async fn get_history(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, BootstrapError> {
        debug!(%session_id, "fetching history");
        let response = self
            .http
            .get(format!("{}/chat/history/{session_id}", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?;
        let body: HistoryResponse = Self::expect_success(response).await?.json().await?;
        Ok(body.history)
    }

    /// Reset the session. Returns the (possibly new) session id.
    pub async fn reset_session(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionId, BootstrapError> {
        debug!(%session_id, "resetting session");
        let response = self
            .http
            .post(format!("{}/chat/session/reset", self.base_url))
            .timeout(self.timeout)
            .json(&SessionRequest {
                session_id: Some(session_id.to_string()),
            })
            .send()
            .await?;
        Self::session_id_from(response).await
    }

    async fn session_id_from(response: Response) -> Result<SessionId, BootstrapError> {
        let body: SessionResponse = Self::expect_success(response).await?.json().await?;
        if body.session_id.is_empty() {
            return Err(BootstrapError::Malformed("empty sessionId".into()));
        }
        Ok(SessionId::from(body.session_id))
    }

    /// Map non-success statuses to [`BootstrapError::Rejected`], preferring
    /// the backend's `message` field over the bare status reason.
    async fn expect_success(response: Response) -> Result<Response, BootstrapError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        Err(BootstrapError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
