use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::models::{SessionCredentials, UserProfile};
use crate::storage::{
    KeyValueStore, StorageError, StorageTier, StorageTiers, ACCESS_TOKEN_KEY, ALL_KEYS,
    REFRESH_TOKEN_KEY, REMEMBER_ME_KEY, USER_KEY,
};

/// Keys that move together between tiers
const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Sole owner of the persisted session.
///
/// The remember-me flag is always kept in the durable tier; the tokens and the
/// cached profile live together in the tier that flag selects. Nothing else in
/// the crate touches the storage tiers directly.
/// Clone is cheap - the tiers and the write lock are shared.
#[derive(Clone)]
pub struct TokenStore {
    tiers: StorageTiers,
    /// Serializes multi-key writes so a clear never interleaves with an update
    writes: Arc<Mutex<()>>,
}

impl TokenStore {
    pub fn new(tiers: StorageTiers) -> Self {
        Self {
            tiers,
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tier currently holding the session, if any.
    ///
    /// Follows the remember-me flag when present. Without one (a store written
    /// by something else, or a half-cleared one) the durable tier wins if it
    /// holds a token, then the session tier.
    pub fn active_tier(&self) -> Result<Option<StorageTier>, StorageError> {
        match self.tiers.durable.get(REMEMBER_ME_KEY)?.as_deref() {
            Some("true") => return Ok(Some(StorageTier::Durable)),
            Some("false") => return Ok(Some(StorageTier::Session)),
            Some(other) => warn!(value = other, "Ignoring unrecognized remember_me flag"),
            None => {}
        }

        for tier in [StorageTier::Durable, StorageTier::Session] {
            let store = self.tiers.tier(tier);
            if store.get(ACCESS_TOKEN_KEY)?.is_some() || store.get(REFRESH_TOKEN_KEY)?.is_some() {
                return Ok(Some(tier));
            }
        }
        Ok(None)
    }

    /// Current credentials, or `None` when nothing is stored
    pub fn get(&self) -> Result<Option<SessionCredentials>, StorageError> {
        let Some(tier) = self.active_tier()? else {
            return Ok(None);
        };
        let store = self.tiers.tier(tier);
        let creds = SessionCredentials {
            access_token: store.get(ACCESS_TOKEN_KEY)?,
            refresh_token: store.get(REFRESH_TOKEN_KEY)?,
            remember_me: tier == StorageTier::Durable,
        };
        if creds.is_empty() {
            Ok(None)
        } else {
            Ok(Some(creds))
        }
    }

    /// Persist a session. The access token is always written; the refresh
    /// token goes to the durable tier when `remember` is set, otherwise to the
    /// session tier. Whatever the other tier held is removed.
    pub fn set(&self, creds: &SessionCredentials, remember: bool) -> Result<(), StorageError> {
        let _writes = self.lock_writes();
        let tier = StorageTier::for_remember(remember);
        let target = self.tiers.tier(tier);

        write_optional(target, ACCESS_TOKEN_KEY, creds.access_token.as_deref())?;
        write_optional(target, REFRESH_TOKEN_KEY, creds.refresh_token.as_deref())?;

        let stale = self.tiers.tier(tier.other());
        for key in SESSION_KEYS {
            stale.remove(key)?;
        }

        self.tiers
            .durable
            .set(REMEMBER_ME_KEY, if remember { "true" } else { "false" })?;

        debug!(?tier, "Session credentials stored");
        Ok(())
    }

    /// Replace the access token, keeping the tier chosen at login.
    /// Returns `false` and writes nothing when no session is stored.
    pub fn set_access_token(&self, token: &str) -> Result<bool, StorageError> {
        let _writes = self.lock_writes();
        self.write_in_active_tier(ACCESS_TOKEN_KEY, token)
    }

    /// Replace the refresh token (rotation), keeping the tier chosen at login.
    /// Returns `false` and writes nothing when no session is stored.
    pub fn set_refresh_token(&self, token: &str) -> Result<bool, StorageError> {
        let _writes = self.lock_writes();
        self.write_in_active_tier(REFRESH_TOKEN_KEY, token)
    }

    /// Store the result of exchanging `sent_refresh`, but only if that refresh
    /// token is still the stored one. A session cleared or replaced while the
    /// exchange was in flight is left untouched and `false` is returned.
    pub fn apply_refresh(
        &self,
        sent_refresh: &str,
        access: &str,
        rotated: Option<&str>,
    ) -> Result<bool, StorageError> {
        let _writes = self.lock_writes();
        let Some(tier) = self.active_tier()? else {
            return Ok(false);
        };
        let store = self.tiers.tier(tier);
        if store.get(REFRESH_TOKEN_KEY)?.as_deref() != Some(sent_refresh) {
            return Ok(false);
        }
        store.set(ACCESS_TOKEN_KEY, access)?;
        if let Some(refresh) = rotated {
            store.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(true)
    }

    fn write_in_active_tier(&self, key: &str, value: &str) -> Result<bool, StorageError> {
        match self.active_tier()? {
            Some(tier) => {
                self.tiers.tier(tier).set(key, value)?;
                Ok(true)
            }
            None => {
                debug!(key, "No stored session, dropping write");
                Ok(false)
            }
        }
    }

    /// Drop only the access token, leaving the refresh token in place
    pub fn clear_access_token(&self) -> Result<(), StorageError> {
        let _writes = self.lock_writes();
        self.tiers.durable.remove(ACCESS_TOKEN_KEY)?;
        self.tiers.session.remove(ACCESS_TOKEN_KEY)
    }

    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.get()?.and_then(|c| c.access_token))
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.get()?.and_then(|c| c.refresh_token))
    }

    /// Whether the current session was stored with remember-me
    pub fn remember_me(&self) -> Result<bool, StorageError> {
        Ok(self.active_tier()? == Some(StorageTier::Durable))
    }

    /// Cached profile. A profile that no longer parses is treated as absent.
    pub fn user(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(tier) = self.active_tier()? else {
            return Ok(None);
        };
        let Some(raw) = self.tiers.tier(tier).get(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached profile");
                Ok(None)
            }
        }
    }

    /// Cache the profile alongside the tokens. Dropped when no session is stored.
    pub fn set_user(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let json = serde_json::to_string(profile).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let _writes = self.lock_writes();
        self.write_in_active_tier(USER_KEY, &json)
    }

    /// Remove every session key from every tier
    pub fn clear(&self) -> Result<(), StorageError> {
        let _writes = self.lock_writes();
        for key in ALL_KEYS {
            self.tiers.durable.remove(key)?;
            self.tiers.session.remove(key)?;
        }
        debug!("Session credentials cleared");
        Ok(())
    }
}

fn write_optional(store: &dyn KeyValueStore, key: &str, value: Option<&str>) -> Result<(), StorageError> {
    match value {
        Some(v) => store.set(key, v),
        None => store.remove(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::storage::MemoryStore;

    fn tiers() -> (Arc<MemoryStore>, Arc<MemoryStore>, TokenStore) {
        let durable = Arc::new(MemoryStore::new());
        let session = Arc::new(MemoryStore::new());
        let store = TokenStore::new(StorageTiers::new(durable.clone(), session.clone()));
        (durable, session, store)
    }

    #[test]
    fn test_empty_store() {
        let (_, _, store) = tiers();
        assert!(store.get().unwrap().is_none());
        assert!(store.active_tier().unwrap().is_none());
        assert!(!store.remember_me().unwrap());
    }

    #[test]
    fn test_remember_writes_durable_tier() {
        let (durable, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), true).unwrap();

        assert_eq!(durable.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
        assert_eq!(durable.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A1"));
        assert_eq!(durable.get(REMEMBER_ME_KEY).unwrap().as_deref(), Some("true"));
        assert!(session.is_empty());

        let creds = store.get().unwrap().unwrap();
        assert_eq!(creds.access_token.as_deref(), Some("A1"));
        assert_eq!(creds.refresh_token.as_deref(), Some("R1"));
        assert!(creds.remember_me);
    }

    #[test]
    fn test_no_remember_writes_session_tier() {
        let (durable, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), false).unwrap();

        assert_eq!(session.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
        assert_eq!(durable.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(durable.get(REMEMBER_ME_KEY).unwrap().as_deref(), Some("false"));
        assert!(!store.get().unwrap().unwrap().remember_me);
    }

    #[test]
    fn test_switching_tiers_removes_stale_copy() {
        let (durable, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), true).unwrap();
        store.set(&SessionCredentials::new("A2", "R2"), false).unwrap();

        assert_eq!(durable.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(durable.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(session.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A2"));
    }

    #[test]
    fn test_set_access_token_keeps_tier() {
        let (durable, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), true).unwrap();
        assert!(store.set_access_token("A2").unwrap());

        assert_eq!(durable.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A2"));
        assert_eq!(durable.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
        assert!(session.is_empty());
    }

    #[test]
    fn test_clear_removes_everything() {
        let (durable, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), true).unwrap();
        store
            .set_user(&UserProfile {
                id: 1,
                username: "aria".to_string(),
                email: None,
                gold: None,
                level: None,
                guild: None,
            })
            .unwrap();
        session.set(ACCESS_TOKEN_KEY, "leftover").unwrap();

        store.clear().unwrap();
        assert!(durable.is_empty());
        assert!(session.is_empty());
        assert!(store.get().unwrap().is_none());
        assert!(store.user().unwrap().is_none());
    }

    #[test]
    fn test_session_tier_lost_on_restart() {
        let (_, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), false).unwrap();

        session.wipe();
        assert!(store.get().unwrap().is_none());
        assert!(store.refresh_token().unwrap().is_none());
    }

    #[test]
    fn test_user_roundtrip_and_corrupt_profile() {
        let (durable, _, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), true).unwrap();

        let profile = UserProfile {
            id: 3,
            username: "brom".to_string(),
            email: None,
            gold: Some(10),
            level: None,
            guild: None,
        };
        store.set_user(&profile).unwrap();
        assert_eq!(store.user().unwrap(), Some(profile));

        durable.set(USER_KEY, "{not json").unwrap();
        assert_eq!(store.user().unwrap(), None);
    }

    #[test]
    fn test_flagless_store_falls_back_to_tokens() {
        let (durable, _, store) = tiers();
        durable.set(REFRESH_TOKEN_KEY, "R1").unwrap();

        let creds = store.get().unwrap().unwrap();
        assert!(creds.refresh_only());
        assert!(creds.remember_me);
    }

    #[test]
    fn test_updates_without_session_write_nothing() {
        let (durable, session, store) = tiers();

        assert!(!store.set_access_token("A2").unwrap());
        assert!(!store.set_refresh_token("R2").unwrap());
        assert!(!store.apply_refresh("R1", "A2", None).unwrap());
        assert!(durable.is_empty());
        assert!(session.is_empty());
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_apply_refresh_after_clear_is_dropped() {
        let (durable, session, store) = tiers();
        store.set(&SessionCredentials::new("A1", "R1"), false).unwrap();
        store.clear().unwrap();

        assert!(!store.apply_refresh("R1", "A2", Some("R2")).unwrap());
        assert!(durable.is_empty());
        assert!(session.is_empty());
    }

    #[test]
    fn test_apply_refresh_ignores_replaced_session() {
        let (_, _, store) = tiers();
        store.set(&SessionCredentials::new("B1", "S1"), true).unwrap();

        // Exchange was started with a refresh token from an earlier login
        assert!(!store.apply_refresh("R1", "A2", None).unwrap());
        let creds = store.get().unwrap().unwrap();
        assert_eq!(creds.access_token.as_deref(), Some("B1"));
        assert_eq!(creds.refresh_token.as_deref(), Some("S1"));

        assert!(store.apply_refresh("S1", "B2", Some("S2")).unwrap());
        let creds = store.get().unwrap().unwrap();
        assert_eq!(creds.access_token.as_deref(), Some("B2"));
        assert_eq!(creds.refresh_token.as_deref(), Some("S2"));
    }
}
