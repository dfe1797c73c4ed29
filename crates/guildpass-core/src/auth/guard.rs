use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[cfg(feature = "ts")]
use ts_rs::TS;

use crate::storage::StorageError;

use super::claims::{self, TokenShape};
use super::events::{LogoutReason, SessionSignals};
use super::refresher::{RefreshError, TokenRefresher};
use super::store::TokenStore;

/// What a protected view should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    /// Resolution pending; show a loading state
    Loading,
    Authenticated,
    Unauthenticated { redirect: String },
    /// A proactive refresh hit a network failure. Credentials are kept;
    /// show a retry affordance.
    Unreachable { message: String },
}

impl GuardState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, GuardState::Authenticated)
    }
}

/// Gate in front of protected views.
///
/// `resolve` is run when a protected view mounts; it publishes `Loading`
/// right away and the final state once credentials are checked.
#[derive(Clone)]
pub struct AuthGuard {
    store: TokenStore,
    refresher: TokenRefresher,
    signals: SessionSignals,
    expiry_tolerance: Duration,
    state: Arc<watch::Sender<GuardState>>,
}

impl AuthGuard {
    pub fn new(
        store: TokenStore,
        refresher: TokenRefresher,
        signals: SessionSignals,
        expiry_tolerance: Duration,
    ) -> Self {
        let (state, _) = watch::channel(GuardState::Loading);
        Self {
            store,
            refresher,
            signals,
            expiry_tolerance,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    pub async fn resolve(&self) -> Result<GuardState, StorageError> {
        self.state.send_replace(GuardState::Loading);
        let resolved = self.check().await?;
        debug!(state = ?resolved, "Auth guard resolved");
        self.state.send_replace(resolved.clone());
        Ok(resolved)
    }

    async fn check(&self) -> Result<GuardState, StorageError> {
        let Some(creds) = self.store.get()? else {
            self.signals.unauthenticated();
            return Ok(self.unauthenticated());
        };

        if let Some(ref access) = creds.access_token {
            match claims::inspect(access) {
                TokenShape::Malformed => {
                    warn!("Stored access token does not decode, clearing session");
                    return self.end_session(LogoutReason::Tampered);
                }
                TokenShape::Jwt(claims) if claims.expired_beyond(Utc::now(), self.expiry_tolerance) => {
                    // Left in place until the refresh settles; it is overwritten on success
                    info!(expired_at = ?claims.expires_at(), "Stored access token expired");
                    if !creds.has_refresh() {
                        return self.end_session(LogoutReason::RefreshRejected);
                    }
                }
                _ => {
                    self.signals.restored();
                    return Ok(GuardState::Authenticated);
                }
            }
        }

        // Only a usable refresh credential left
        match self.refresher.refresh().await {
            Ok(_) => {
                self.signals.restored();
                Ok(GuardState::Authenticated)
            }
            Err(RefreshError::Invalid) => self.end_session(LogoutReason::RefreshRejected),
            Err(RefreshError::Network(msg)) => {
                warn!(error = %msg, "Proactive token refresh failed");
                Ok(GuardState::Unreachable {
                    message: "Network error. Check your connection and try again.".to_string(),
                })
            }
            Err(RefreshError::Superseded) => {
                if self.store.get()?.is_some_and(|c| c.has_access()) {
                    Ok(GuardState::Authenticated)
                } else {
                    self.signals.unauthenticated();
                    Ok(self.unauthenticated())
                }
            }
            Err(RefreshError::Storage(e)) => Err(e),
        }
    }

    fn end_session(&self, reason: LogoutReason) -> Result<GuardState, StorageError> {
        self.store.clear()?;
        self.signals.logged_out(reason);
        Ok(self.unauthenticated())
    }

    fn unauthenticated(&self) -> GuardState {
        GuardState::Unauthenticated {
            redirect: self.signals.login_redirect().to_string(),
        }
    }
}
