//! Shared fixtures for the session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use modsentry_core::auth::{CredentialStore, MemoryStore, TokenPair, User};
use modsentry_core::SessionManager;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const HISTORY_PATH: &str = "/api/moderation/history/";
pub const POLICIES_PATH: &str = "/api/moderation/policies/";
pub const REFRESH_PATH: &str = "/api/auth/refresh/";
pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const LOGOUT_PATH: &str = "/api/auth/logout/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const PROFILE_PATH: &str = "/api/auth/profile/";

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

pub fn alice() -> User {
    User {
        id: 1,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        role: Some("moderator".to_string()),
        first_name: None,
        last_name: None,
    }
}

pub fn user_json() -> Value {
    json!({
        "id": 1,
        "username": "alice",
        "email": "alice@example.com",
        "role": "moderator"
    })
}

pub fn empty_history() -> Value {
    json!({"count": 0, "results": []})
}

pub fn policy_list(name: &str) -> Value {
    json!({
        "count": 1,
        "policies": [{
            "id": 5,
            "filename": name,
            "file_size": 100,
            "uploaded_at": "2024-05-01T10:00:00Z"
        }],
        "policy_store_exists": true
    })
}

/// Manager pointed at `server` with no stored session
pub fn anonymous_manager(server: &MockServer) -> (SessionManager, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(&server.uri(), storage.clone(), Duration::from_secs(5))
        .expect("session manager should build");
    (manager, storage)
}

/// Manager whose storage already holds `tok1` / `ref1` for alice
pub fn logged_in_manager(server: &MockServer) -> (SessionManager, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    CredentialStore::new(storage.clone()).save(
        &TokenPair {
            access: "tok1".to_string(),
            refresh: "ref1".to_string(),
        },
        &alice(),
    );
    let manager = SessionManager::new(&server.uri(), storage.clone(), Duration::from_secs(5))
        .expect("session manager should build");
    (manager, storage)
}

pub fn credentials(storage: &Arc<MemoryStore>) -> CredentialStore {
    CredentialStore::new(storage.clone())
}
