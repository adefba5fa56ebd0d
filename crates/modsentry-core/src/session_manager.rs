//! Public session API: login, registration, logout and session queries.
//!
//! One `SessionManager` is constructed explicitly and shared (by reference or
//! `Arc`) with whatever needs it. Construction reads the credential store
//! synchronously, so the initial authenticated/unauthenticated state is known
//! before any UI renders.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::{
    ApiError, AuthApi, LoginCredentials, ModerationApi, RefreshEndpoint, Registration,
    RequestGateway,
};
use crate::auth::{
    AuthError, AuthState, CredentialStore, KeyValueStore, RefreshCoordinator, SessionEvent,
    SessionEvents, TokenPair, User,
};
use crate::config::Config;

/// Upper bound on the best-effort server logout call
const LOGOUT_TIMEOUT_SECS: u64 = 10;

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const NETWORK_FAILED: &str = "Unable to connect to server. Check your internet connection.";

/// Server error keys checked in priority order for a user-facing message
const ERROR_KEYS: [&str; 6] = [
    "username",
    "email",
    "password",
    "error",
    "detail",
    "non_field_errors",
];

/// Result of login/registration. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failure(AuthError),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success)
    }

    /// User-facing failure message
    pub fn error(&self) -> Option<String> {
        match self {
            AuthOutcome::Success => None,
            AuthOutcome::Failure(e) => Some(e.to_string()),
        }
    }
}

pub struct SessionManager {
    store: CredentialStore,
    events: SessionEvents,
    gateway: RequestGateway,
    auth: AuthApi,
    logout_timeout: Duration,
}

impl SessionManager {
    /// Wire up the session stack against `base_url` and hydrate from storage
    pub fn new(
        base_url: &str,
        storage: Arc<dyn KeyValueStore>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        let store = CredentialStore::new(storage);
        let events = SessionEvents::new(Self::hydrate(&store));

        let refresher = Arc::new(RefreshEndpoint::new(client.clone(), base_url));
        let coordinator = RefreshCoordinator::new(store.clone(), events.clone(), refresher);
        let gateway = RequestGateway::new(client, base_url, store.clone(), coordinator);

        Ok(Self {
            store,
            events,
            auth: AuthApi::new(gateway.clone()),
            gateway,
            logout_timeout: Duration::from_secs(LOGOUT_TIMEOUT_SECS),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = config.session_storage()?;
        Ok(Self::new(
            &config.api_base_url(),
            storage,
            config.request_timeout(),
        )?)
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Initial state from storage. A half-present session is discarded.
    fn hydrate(store: &CredentialStore) -> AuthState {
        match (store.load_user(), store.load_access_token()) {
            (Some(user), Some(_)) => {
                debug!(user_id = user.id, "Restored session from storage");
                AuthState::Authenticated(user)
            }
            (None, None) if store.load_refresh_token().is_none() => AuthState::Unauthenticated,
            _ => {
                warn!("Incomplete session in storage, discarding it");
                store.clear();
                AuthState::Unauthenticated
            }
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> AuthOutcome {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return AuthOutcome::Failure(AuthError::Validation(
                "Username and password required".to_string(),
            ));
        }

        match self.auth.login(credentials).await {
            Ok(response) => {
                self.establish(&response.tokens, response.user);
                info!(username = %credentials.username, "Login successful");
                AuthOutcome::Success
            }
            Err(e) => {
                warn!(username = %credentials.username, error = %e, "Login failed");
                AuthOutcome::Failure(normalize_error(&e, LOGIN_FAILED))
            }
        }
    }

    pub async fn register(&self, registration: &Registration) -> AuthOutcome {
        if registration.password != registration.password2 {
            return AuthOutcome::Failure(AuthError::Validation(
                "Passwords do not match".to_string(),
            ));
        }

        match self.auth.register(registration).await {
            Ok(response) => {
                self.establish(&response.tokens, response.user);
                info!(username = %registration.username, "Registration successful");
                AuthOutcome::Success
            }
            Err(e) => {
                warn!(username = %registration.username, error = %e, "Registration failed");
                AuthOutcome::Failure(normalize_error(&e, REGISTRATION_FAILED))
            }
        }
    }

    /// End the session. The server call is best-effort; local teardown always
    /// happens and repeated calls are harmless.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store.load_refresh_token() {
            match tokio::time::timeout(self.logout_timeout, self.auth.logout(&refresh_token)).await
            {
                Ok(Ok(())) => debug!("Server session invalidated"),
                Ok(Err(e)) => warn!(error = %e, "Server logout failed, clearing local session"),
                Err(_) => warn!("Server logout timed out, clearing local session"),
            }
        }

        self.store.clear();
        self.events.logged_out();
        info!("Logged out");
    }

    /// Re-fetch the user profile and replace the stored snapshot
    pub async fn reload_profile(&self) -> Result<User, ApiError> {
        let user = self.auth.profile().await?;
        if self.is_authenticated() {
            self.store.set_user(&user);
            self.events.user_updated(user.clone());
        }
        Ok(user)
    }

    pub fn current_user(&self) -> Option<User> {
        self.events.current().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.events.current().is_authenticated()
    }

    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.events.watch()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Gateway for authenticated calls made on behalf of this session
    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn moderation(&self) -> ModerationApi {
        ModerationApi::new(self.gateway.clone())
    }

    fn establish(&self, tokens: &TokenPair, user: User) {
        self.store.save(tokens, &user);
        self.events.logged_in(user);
    }
}

/// Collapse a failed credential exchange into one user-facing error
fn normalize_error(error: &ApiError, fallback: &str) -> AuthError {
    if error.is_network() {
        return AuthError::Network(NETWORK_FAILED.to_string());
    }
    AuthError::Credential(
        error
            .body_json()
            .and_then(|body| field_error(&body))
            .unwrap_or_else(|| fallback.to_string()),
    )
}

fn field_error(body: &serde_json::Value) -> Option<String> {
    ERROR_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(first_message))
}

/// First non-empty message in a string or (nested) list of strings
fn first_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(first_message),
        _ => None,
    }
}
