//! Session lifecycle: token storage, refresh, and the auth guard.
//!
//! This module provides:
//! - `TokenStore`: sole owner of the persisted credentials (durable or session tier)
//! - `TokenRefresher`: single-flight exchange of the refresh token for a new access token
//! - `AuthGuard`: resolves whether protected views may render
//! - `SessionSignals`: typed session events and the current `AuthStatus`

pub mod claims;
pub mod events;
pub mod guard;
pub mod refresher;
pub mod store;

pub use events::{AuthStatus, LogoutReason, SessionEvent, SessionSignals};
pub use guard::{AuthGuard, GuardState};
pub use refresher::{RefreshError, TokenRefresher};
pub use store::TokenStore;
