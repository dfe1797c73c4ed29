//! The session service: one object owning the token store, refresher,
//! request wrapper, guard, and signals, injected wherever a front-end needs
//! to log in, make API calls, or gate a view.

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, HttpTransport, ReqwestTransport};
use crate::auth::{AuthGuard, LogoutReason, SessionSignals, TokenRefresher, TokenStore};
use crate::config::{Config, DurableBackend};
use crate::models::{LoginRequest, SessionCredentials, TokenPair, UserProfile};
use crate::storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError, StorageTiers};

#[derive(Clone)]
pub struct SessionService {
    config: Config,
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    signals: SessionSignals,
    refresher: TokenRefresher,
    client: ApiClient,
    guard: AuthGuard,
}

impl SessionService {
    pub fn new(config: Config, tiers: StorageTiers, transport: Arc<dyn HttpTransport>) -> Self {
        let store = TokenStore::new(tiers);
        let signals = SessionSignals::new(&config.login_redirect);
        let refresher = TokenRefresher::new(
            Arc::clone(&transport),
            store.clone(),
            signals.clone(),
            config.refresh_path.clone(),
        );
        let client = ApiClient::new(Arc::clone(&transport), store.clone(), refresher.clone(), signals.clone());
        let guard = AuthGuard::new(
            store.clone(),
            refresher.clone(),
            signals.clone(),
            config.expiry_tolerance(),
        );

        Self {
            config,
            transport,
            store,
            signals,
            refresher,
            client,
            guard,
        }
    }

    /// Wire up the real HTTP transport and storage tiers for `config`.
    /// The session tier is process memory, so it ends with the process.
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.api_base_url, config.request_timeout())?;
        let durable: Arc<dyn KeyValueStore> = match config.durable_backend {
            DurableBackend::File => Arc::new(FileStore::in_dir(&Config::config_dir()?)),
            DurableBackend::Keyring => Arc::new(KeyringStore::new()),
        };
        let tiers = StorageTiers::new(durable, Arc::new(MemoryStore::new()));
        Ok(Self::new(config, tiers, Arc::new(transport)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn guard(&self) -> &AuthGuard {
        &self.guard
    }

    pub fn signals(&self) -> &SessionSignals {
        &self.signals
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Exchange a username and password for a token pair and store it.
    /// With `remember` the refresh token survives a restart.
    pub async fn login(&self, username: &str, password: &str, remember: bool) -> Result<(), ApiError> {
        let request = ApiRequest::post(&self.config.login_path, &LoginRequest { username, password })
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode login request: {}", e)))?;

        let response = self
            .transport
            .send(&request, None)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status == StatusCode::UNAUTHORIZED || response.status == StatusCode::BAD_REQUEST {
            info!(username, "Login rejected");
            return Err(ApiError::InvalidCredentials);
        }
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        let tokens: TokenPair = response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        // A previous player's cached profile must not leak into this session
        self.store.clear()?;
        self.store
            .set(&SessionCredentials::new(tokens.access, tokens.refresh), remember)?;

        info!(username, remember, "Logged in");
        self.signals.logged_in(remember);
        Ok(())
    }

    pub fn logout(&self) -> Result<(), StorageError> {
        self.store.clear()?;
        self.signals.logged_out(LogoutReason::UserRequested);
        Ok(())
    }

    /// Fetch the player's profile through the authenticated client and cache it
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let profile: UserProfile = self.client.get_json(&self.config.profile_path).await?;
        if let Err(e) = self.store.set_user(&profile) {
            warn!(error = %e, "Failed to cache user profile");
        }
        Ok(profile)
    }

    pub fn cached_profile(&self) -> Result<Option<UserProfile>, StorageError> {
        self.store.user()
    }

    /// Whether any credential is stored (without contacting the backend)
    pub fn has_session(&self) -> Result<bool, StorageError> {
        Ok(self.store.get()?.is_some())
    }

    pub fn remember_me(&self) -> Result<bool, StorageError> {
        self.store.remember_me()
    }
}
