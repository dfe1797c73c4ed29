//! Authenticated request wrapper for the quest platform API.
//!
//! Every request carries the stored access token. A 401 triggers one token
//! refresh (shared with any concurrent callers) and exactly one retry; a second
//! 401, or a rejected refresh token, ends the session.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, trace, warn};

use crate::auth::{LogoutReason, RefreshError, SessionSignals, TokenRefresher, TokenStore};

use super::{ApiError, ApiRequest, ApiResponse, HttpTransport};

/// Where a wrapped request is in its bounded retry cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Sent,
    Refreshing,
    Retried,
    Failed,
}

enum Step {
    Idle,
    Sent {
        token: Option<String>,
        response: ApiResponse,
    },
    Refreshing {
        stale: Option<String>,
    },
    Retried(ApiResponse),
    Failed(LogoutReason),
}

impl Step {
    fn phase(&self) -> RequestPhase {
        match self {
            Step::Idle => RequestPhase::Idle,
            Step::Sent { .. } => RequestPhase::Sent,
            Step::Refreshing { .. } => RequestPhase::Refreshing,
            Step::Retried(_) => RequestPhase::Retried,
            Step::Failed(_) => RequestPhase::Failed,
        }
    }
}

/// API client for the quest platform.
/// Clone is cheap - the transport, store, and refresher are all shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    refresher: TokenRefresher,
    signals: SessionSignals,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: TokenStore,
        refresher: TokenRefresher,
        signals: SessionSignals,
    ) -> Self {
        Self {
            transport,
            store,
            refresher,
            signals,
        }
    }

    /// Send a request with the stored access token.
    ///
    /// Returns the final successful response. Non-401 failures come back as
    /// `ApiError::RequestFailed` untouched; an unrecoverable 401 clears the
    /// session and returns `ApiError::SessionExpired`.
    pub async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut step = Step::Idle;
        loop {
            trace!(phase = ?step.phase(), path = %request.path, "Request step");
            step = match step {
                Step::Idle => {
                    let token = self.store.access_token()?;
                    let response = self.send(request, token.as_deref()).await?;
                    Step::Sent { token, response }
                }
                Step::Sent { token, response } => {
                    if !response.is_unauthorized() {
                        return Self::finish(response);
                    }
                    debug!(path = %request.path, "Access token rejected, refreshing");
                    Step::Refreshing { stale: token }
                }
                Step::Refreshing { stale } => match self.fresh_token(stale.as_deref()).await {
                    Ok(token) => Step::Retried(self.send(request, Some(&token)).await?),
                    Err(RefreshError::Invalid) => Step::Failed(LogoutReason::RefreshRejected),
                    // Logged out (or in again) mid-refresh; whoever did that already signaled
                    Err(RefreshError::Superseded) => match self.store.access_token()? {
                        Some(token) if Some(token.as_str()) != stale.as_deref() => {
                            Step::Retried(self.send(request, Some(&token)).await?)
                        }
                        _ => return Err(ApiError::SessionExpired),
                    },
                    Err(e) => return Err(e.into()),
                },
                Step::Retried(response) => {
                    if !response.is_unauthorized() {
                        return Self::finish(response);
                    }
                    warn!(path = %request.path, "Request rejected again after token refresh");
                    Step::Failed(LogoutReason::RetryRejected)
                }
                Step::Failed(reason) => {
                    self.store.clear()?;
                    self.signals.logged_out(reason);
                    return Err(ApiError::SessionExpired);
                }
            };
        }
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(&ApiRequest::get(path)).await?;
        Self::decode(path, &response)
    }

    /// POST a JSON body to `path` and decode the JSON response
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let request = ApiRequest::post(path, body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body for {}: {}", path, e)))?;
        let response = self.request(&request).await?;
        Self::decode(path, &response)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(&ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// A token newer than the one that was rejected, refreshing only if the
    /// store still holds the rejected one (or nothing).
    async fn fresh_token(&self, stale: Option<&str>) -> Result<String, RefreshError> {
        if let Some(current) = self.store.access_token()? {
            if Some(current.as_str()) != stale {
                debug!("Access token already replaced, retrying with it");
                return Ok(current);
            }
        }
        self.refresher.refresh().await
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.transport
            .send(request, token)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    fn finish(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T, ApiError> {
        response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e)))
    }
}
