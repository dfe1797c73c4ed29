use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiRequest, HttpTransport};
use crate::models::{RefreshRequest, RefreshResponse};
use crate::storage::StorageError;

use super::events::SessionSignals;
use super::store::TokenStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Transport failure or unusable response. The stored credentials are kept.
    #[error("Network error during token refresh: {0}")]
    Network(String),

    /// The backend rejected the refresh token (expired, revoked) or none is stored.
    /// The caller must clear the token store.
    #[error("Refresh token is no longer valid")]
    Invalid,

    /// The session was cleared or replaced while the exchange was in flight.
    /// Nothing was stored.
    #[error("Session changed during token refresh")]
    Superseded,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Exchanges the stored refresh token for a new access token.
///
/// Single-flight: while one exchange is running, every other caller awaits the
/// same result instead of issuing its own network call.
/// Clone is cheap and clones share the in-flight marker.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<RefresherInner>,
}

struct RefresherInner {
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    signals: SessionSignals,
    refresh_path: String,
    in_flight: Mutex<Option<RefreshFuture>>,
    network_calls: AtomicU64,
}

impl TokenRefresher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: TokenStore,
        signals: SessionSignals,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                transport,
                store,
                signals,
                refresh_path: refresh_path.into(),
                in_flight: Mutex::new(None),
                network_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Refresh the access token, joining an exchange already in flight.
    /// Returns the new access token, which is already stored.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let flight = async move { inner.exchange().await }.boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        let mut slot = self.inner.in_flight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        result
    }

    /// Whether an exchange is currently running
    pub async fn is_in_flight(&self) -> bool {
        self.inner.in_flight.lock().await.is_some()
    }

    /// Number of refresh requests actually sent over the network
    pub fn network_calls(&self) -> u64 {
        self.inner.network_calls.load(Ordering::SeqCst)
    }
}

impl RefresherInner {
    async fn exchange(&self) -> Result<String, RefreshError> {
        let Some(refresh_token) = self.store.refresh_token()? else {
            warn!("Token refresh requested without a stored refresh token");
            return Err(RefreshError::Invalid);
        };

        let request = ApiRequest::post(&self.refresh_path, &RefreshRequest { refresh: &refresh_token })
            .map_err(|e| RefreshError::Network(format!("Failed to encode refresh request: {}", e)))?;

        self.network_calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .transport
            .send(&request, None)
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        if !response.is_success() {
            info!(status = response.status.as_u16(), "Refresh token rejected");
            return Err(RefreshError::Invalid);
        }

        let tokens: RefreshResponse = response
            .json()
            .map_err(|e| RefreshError::Network(format!("Failed to parse refresh response: {}", e)))?;

        if !self
            .store
            .apply_refresh(&refresh_token, &tokens.access, tokens.refresh.as_deref())?
        {
            info!("Session ended during token refresh, discarding new tokens");
            return Err(RefreshError::Superseded);
        }

        debug!(rotated = tokens.refresh.is_some(), "Access token refreshed");
        self.signals.token_refreshed();
        Ok(tokens.access)
    }
}
