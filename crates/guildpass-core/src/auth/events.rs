use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::info;

#[cfg(feature = "ts")]
use ts_rs::TS;

/// Buffer size for the session event channel.
/// Events are rare (login, refresh, logout); slow subscribers only miss old ones.
const EVENT_BUFFER_SIZE: usize = 16;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    UserRequested,
    /// The backend rejected the refresh token
    RefreshRejected,
    /// The request still failed with 401 after a successful refresh
    RetryRejected,
    /// The stored access token could not be decoded
    Tampered,
}

impl LogoutReason {
    /// Message to show on the login view, if any
    pub fn message(&self) -> Option<&'static str> {
        match self {
            LogoutReason::UserRequested => None,
            LogoutReason::RefreshRejected | LogoutReason::RetryRejected => {
                Some("Your session has expired. Please log in again.")
            }
            LogoutReason::Tampered => Some("Your session is no longer valid. Please log in again."),
        }
    }
}

/// Session lifecycle events, broadcast to whoever subscribed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { remember: bool },
    TokenRefreshed,
    LoggedOut { reason: LogoutReason },
}

/// Latest authentication state, as consumed by page-level guards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct AuthStatus {
    pub authenticated: bool,
    /// Where an unauthenticated view should send the user
    pub redirect: Option<String>,
    pub message: Option<String>,
}

impl AuthStatus {
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            redirect: None,
            message: None,
        }
    }

    pub fn unauthenticated(redirect: &str, message: Option<&str>) -> Self {
        Self {
            authenticated: false,
            redirect: Some(redirect.to_string()),
            message: message.map(str::to_string),
        }
    }
}

/// Typed replacement for ambient UI events: a broadcast bus of `SessionEvent`s
/// plus a watch channel holding the current `AuthStatus`.
/// Clone is cheap and clones publish to the same channels.
#[derive(Clone)]
pub struct SessionSignals {
    events: broadcast::Sender<SessionEvent>,
    status: Arc<watch::Sender<AuthStatus>>,
    login_redirect: Arc<str>,
}

impl SessionSignals {
    pub fn new(login_redirect: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let (status, _) = watch::channel(AuthStatus::unauthenticated(login_redirect, None));
        Self {
            events,
            status: Arc::new(status),
            login_redirect: Arc::from(login_redirect),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        self.status.borrow().clone()
    }

    pub fn login_redirect(&self) -> &str {
        &self.login_redirect
    }

    pub fn logged_in(&self, remember: bool) {
        self.status.send_replace(AuthStatus::authenticated());
        self.publish(SessionEvent::LoggedIn { remember });
    }

    /// Mark the session authenticated without emitting an event (restored session)
    pub fn restored(&self) {
        self.status.send_replace(AuthStatus::authenticated());
    }

    pub fn token_refreshed(&self) {
        self.publish(SessionEvent::TokenRefreshed);
    }

    pub fn logged_out(&self, reason: LogoutReason) {
        info!(?reason, "Session ended");
        self.status
            .send_replace(AuthStatus::unauthenticated(&self.login_redirect, reason.message()));
        self.publish(SessionEvent::LoggedOut { reason });
    }

    /// Mark unauthenticated without an event (nothing was stored to begin with)
    pub fn unauthenticated(&self) {
        self.status
            .send_replace(AuthStatus::unauthenticated(&self.login_redirect, None));
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
