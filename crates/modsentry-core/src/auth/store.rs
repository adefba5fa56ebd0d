//! Durable storage of the current session's tokens and user profile.
//!
//! Reads never fail: an unavailable or unreadable backend reads as "no
//! session". Writes are best-effort and only logged on failure, so storage
//! trouble never blocks the caller.
//!
//! Every `save` and `clear` starts a new session generation. A token refresh
//! records the generation it started under and only touches the store if it
//! is still current when the refresh settles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::session::{TokenPair, User};
use super::storage::KeyValueStore;

const ACCESS_TOKEN_KEY: &str = "accessToken";
const REFRESH_TOKEN_KEY: &str = "refreshToken";
const USER_KEY: &str = "user";

/// Process-wide credential store shared by the session manager, the refresh
/// coordinator and the request gateway.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    generation: Arc<Mutex<u64>>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Identifies the current session; changes on every `save` and `clear`
    pub fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    /// Persist a freshly issued session
    pub fn save(&self, tokens: &TokenPair, user: &User) {
        let mut generation = self.lock_generation();
        self.write(ACCESS_TOKEN_KEY, &tokens.access);
        self.write(REFRESH_TOKEN_KEY, &tokens.refresh);
        match serde_json::to_string(user) {
            Ok(json) => self.write(USER_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user for storage"),
        }
        *generation += 1;
        debug!(user_id = user.id, generation = *generation, "Session saved");
    }

    /// Replace only the access token, as after a successful refresh.
    ///
    /// Returns false without writing if the session was replaced or cleared
    /// since `generation` was read.
    pub fn set_access_token(&self, generation: u64, token: &str) -> bool {
        let current = self.lock_generation();
        if *current != generation {
            debug!(
                expected = generation,
                current = *current,
                "Session changed, dropping refreshed token"
            );
            return false;
        }
        self.write(ACCESS_TOKEN_KEY, token);
        true
    }

    /// Replace only the stored user profile
    pub fn set_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.write(USER_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user for storage"),
        }
    }

    pub fn load_user(&self) -> Option<User> {
        let json = self.read(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user is unreadable, ignoring it");
                None
            }
        }
    }

    pub fn load_access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn load_refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// The refresh token together with the generation it belongs to
    pub fn refresh_token_snapshot(&self) -> (u64, Option<String>) {
        let generation = self.lock_generation();
        (*generation, self.read(REFRESH_TOKEN_KEY))
    }

    /// Remove every session key. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut generation = self.lock_generation();
        self.remove_all();
        *generation += 1;
        debug!(generation = *generation, "Session cleared");
    }

    /// Clear the session only if it is still the one identified by
    /// `generation`. Returns whether anything was cleared.
    pub fn clear_if_current(&self, generation: u64) -> bool {
        let mut current = self.lock_generation();
        if *current != generation {
            debug!(expected = generation, current = *current, "Session changed, not clearing");
            return false;
        }
        self.remove_all();
        *current += 1;
        debug!(generation = *current, "Session cleared");
        true
    }

    /// True iff both a user and an access token are stored
    pub fn is_authenticated(&self) -> bool {
        self.load_access_token().is_some() && self.load_user().is_some()
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Session storage unavailable, treating as empty");
                None
            }
        }
    }

    fn remove_all(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.backend.remove(key) {
                warn!(key, error = %e, "Failed to remove session key");
            }
        }
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(key, error = %e, "Failed to write session key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStore;
    use anyhow::{anyhow, Result};

    struct UnavailableStore;

    impl KeyValueStore for UnavailableStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("storage disabled"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("storage disabled"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(anyhow!("storage disabled"))
        }
    }

    fn tokens() -> TokenPair {
        TokenPair {
            access: "tok1".to_string(),
            refresh: "ref1".to_string(),
        }
    }

    fn user() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: None,
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        assert!(!store.is_authenticated());

        store.save(&tokens(), &user());
        assert!(store.is_authenticated());
        assert_eq!(store.load_access_token().as_deref(), Some("tok1"));
        assert_eq!(store.load_refresh_token().as_deref(), Some("ref1"));
        assert_eq!(store.load_user(), Some(user()));

        assert!(store.set_access_token(store.generation(), "tok2"));
        assert_eq!(store.load_access_token().as_deref(), Some("tok2"));
        assert_eq!(store.load_refresh_token().as_deref(), Some("ref1"));
    }

    #[test]
    fn test_stale_generation_leaves_session_alone() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        store.save(&tokens(), &user());
        let before_logout = store.generation();

        store.clear();
        assert!(!store.set_access_token(before_logout, "tok2"));
        assert!(store.load_access_token().is_none());

        let before_login = store.generation();
        store.save(&tokens(), &user());
        assert!(!store.clear_if_current(before_login));
        assert!(store.is_authenticated());

        assert!(store.clear_if_current(store.generation()));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clones_share_generation() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        let other = store.clone();
        let start = store.generation();
        other.save(&tokens(), &user());
        assert_ne!(store.generation(), start);
        assert_eq!(store.generation(), other.generation());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        store.save(&tokens(), &user());

        store.clear();
        store.clear();
        assert!(!store.is_authenticated());
        assert!(store.load_access_token().is_none());
        assert!(store.load_refresh_token().is_none());
        assert!(store.load_user().is_none());
    }

    #[test]
    fn test_unavailable_backend_reads_as_no_session() {
        let store = CredentialStore::new(Arc::new(UnavailableStore));
        store.save(&tokens(), &user());
        store.clear();
        assert!(!store.is_authenticated());
        assert!(store.load_user().is_none());
    }

    #[test]
    fn test_token_without_user_is_not_authenticated() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(ACCESS_TOKEN_KEY, "tok1").unwrap();
        let store = CredentialStore::new(backend.clone());
        assert!(!store.is_authenticated());

        backend.set(USER_KEY, "{broken").unwrap();
        assert!(store.load_user().is_none());
        assert!(!store.is_authenticated());
    }
}
