//! Key-value storage tiers backing the token store.
//!
//! This module provides:
//! - `KeyValueStore`: the string key/value interface every tier implements
//! - `MemoryStore`: session tier, lives only as long as the process
//! - `FileStore`: durable tier, a JSON file in the user config directory
//! - `KeyringStore`: durable tier backed by the OS keychain
//!
//! Tiers are shared between clones (they are handed out as `Arc<dyn KeyValueStore>`)
//! and writes are last-writer-wins.

pub mod file;
pub mod keychain;
pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// Storage key for the access credential
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key for the remember-me flag ("true" / "false")
pub const REMEMBER_ME_KEY: &str = "remember_me";

/// Storage key for the cached user profile JSON
pub const USER_KEY: &str = "user";

/// Every key the token store ever writes.
pub const ALL_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, REMEMBER_ME_KEY, USER_KEY];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Corrupt storage file: {0}")]
    Corrupt(String),

    #[error("Keychain error: {0}")]
    Keychain(String),
}

/// A flat string key/value store.
///
/// Implementations must be safe to share between tasks; methods are synchronous
/// because every backend here completes without waiting on the network.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Persistence lifetime of a storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Survives a restart
    Durable,
    /// Cleared when the process exits
    Session,
}

impl StorageTier {
    pub fn for_remember(remember: bool) -> Self {
        if remember {
            StorageTier::Durable
        } else {
            StorageTier::Session
        }
    }

    pub fn other(self) -> Self {
        match self {
            StorageTier::Durable => StorageTier::Session,
            StorageTier::Session => StorageTier::Durable,
        }
    }
}

/// The pair of tiers a token store writes to.
#[derive(Clone)]
pub struct StorageTiers {
    pub durable: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
}

impl StorageTiers {
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Two independent in-memory tiers, mostly useful for tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn tier(&self, tier: StorageTier) -> &dyn KeyValueStore {
        match tier {
            StorageTier::Durable => self.durable.as_ref(),
            StorageTier::Session => self.session.as_ref(),
        }
    }
}
