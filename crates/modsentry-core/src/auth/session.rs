use serde::{Deserialize, Serialize};

/// Authenticated user as returned by the auth server.
///
/// Held as an immutable snapshot for the lifetime of a session and replaced
/// wholesale on the next login or profile reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    /// Full name if the server provided one, otherwise the username
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        match (first.is_empty(), last.is_empty()) {
            (true, true) => self.username.clone(),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (false, false) => format!("{} {}", first, last),
        }
    }
}

/// Access/refresh token pair from login or registration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

// Tokens never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Observable authentication state of the client
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated(User),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Unauthenticated => None,
        }
    }
}

/// Session lifecycle notifications for front ends.
///
/// `Invalidated` replaces a hard redirect: it is published once when a
/// refresh fails and the session has already been torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(User),
    TokenRefreshed,
    LoggedOut,
    Invalidated,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Some("moderator".to_string()),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(user().display_name(), "alice");

        let mut named = user();
        named.first_name = Some("Alice".to_string());
        named.last_name = Some("Liddell".to_string());
        assert_eq!(named.display_name(), "Alice Liddell");

        named.last_name = Some("  ".to_string());
        assert_eq!(named.display_name(), "Alice");
    }

    #[test]
    fn test_user_parses_minimal_server_payload() {
        let json = r#"{"id": 3, "username": "bob"}"#;
        let parsed: User = serde_json::from_str(json).expect("minimal user should parse");
        assert_eq!(parsed.username, "bob");
        assert_eq!(parsed.email, "");
        assert!(parsed.role.is_none());
    }

    #[test]
    fn test_token_pair_debug_is_redacted() {
        let tokens = TokenPair {
            access: "secret-access".to_string(),
            refresh: "secret-refresh".to_string(),
        };
        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_auth_state_user() {
        assert!(AuthState::Unauthenticated.user().is_none());
        let state = AuthState::Authenticated(user());
        assert!(state.is_authenticated());
        assert_eq!(state.user().map(|u| u.id), Some(7));
    }
}
