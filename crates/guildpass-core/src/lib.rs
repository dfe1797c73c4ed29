//! Session lifecycle client for the quest platform API.
//!
//! `guildpass-core` keeps a player signed in: it stores the access and refresh
//! tokens in a durable or session-scoped tier, refreshes the access token
//! single-flight, wraps API requests with a refresh-and-retry-once cycle, and
//! resolves whether protected views may render.
//!
//! Most front-ends only need [`SessionService`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
pub use auth::{
    AuthGuard, AuthStatus, GuardState, LogoutReason, RefreshError, SessionEvent, SessionSignals,
    TokenRefresher, TokenStore,
};
pub use config::{Config, DurableBackend};
pub use models::{SessionCredentials, UserProfile};
pub use session::SessionService;
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError, StorageTier, StorageTiers};
