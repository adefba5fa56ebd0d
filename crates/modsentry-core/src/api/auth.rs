//! Credential-exchange endpoints of the auth server.
//!
//! Login, registration, logout and profile go through the `RequestGateway`.
//! Token refresh is sent straight on the HTTP client: it is what the gateway
//! falls back on, so it must never loop back through it.

use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{TokenPair, TokenRefresher, User};

use super::gateway::RequestGateway;
use super::request::RequestDescriptor;
use super::ApiError;

const REGISTER_PATH: &str = "/api/auth/register/";
const LOGIN_PATH: &str = "/api/auth/login/";
const LOGOUT_PATH: &str = "/api/auth/logout/";
const REFRESH_PATH: &str = "/api/auth/refresh/";
const PROFILE_PATH: &str = "/api/auth/profile/";

#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Registration form; `password2` is the confirmation field
#[derive(Clone, Default, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Successful login/registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Serialize)]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

/// Auth server endpoints that ride on the gateway
#[derive(Clone)]
pub struct AuthApi {
    gateway: RequestGateway,
}

impl AuthApi {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        let request = RequestDescriptor::post(LOGIN_PATH)
            .optional_auth()
            .with_json(credentials)?;
        self.gateway.send_json(&request).await
    }

    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let request = RequestDescriptor::post(REGISTER_PATH)
            .optional_auth()
            .with_json(registration)?;
        self.gateway.send_json(&request).await
    }

    /// Ask the server to blacklist the refresh token
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let request = RequestDescriptor::post(LOGOUT_PATH)
            .optional_auth()
            .with_json(&LogoutRequest { refresh_token })?;
        self.gateway.send(&request).await?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.gateway
            .send_json(&RequestDescriptor::get(PROFILE_PATH))
            .await
    }
}

/// Direct HTTP call to the token refresh endpoint
pub struct RefreshEndpoint {
    client: Client,
    url: String,
}

impl RefreshEndpoint {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH),
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        debug!(url = %self.url, "Requesting new access token");
        let response = self
            .client
            .post(&self.url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let parsed: RefreshResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;
        Ok(parsed.access)
    }
}

impl TokenRefresher for RefreshEndpoint {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<String, ApiError>> {
        RefreshEndpoint::refresh(self, refresh_token).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_response() {
        let json = r#"{
            "user": {"id": 4, "username": "alice", "email": "alice@example.com", "first_name": "", "last_name": ""},
            "tokens": {"access": "tok1", "refresh": "ref1"}
        }"#;
        let parsed: AuthResponse = serde_json::from_str(json).expect("auth response should parse");
        assert_eq!(parsed.user.username, "alice");
        assert_eq!(parsed.tokens.access, "tok1");
        assert_eq!(parsed.tokens.refresh, "ref1");
    }

    #[test]
    fn test_registration_serializes_confirmation() {
        let registration = Registration {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "s3cret".to_string(),
            password2: "s3cret".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&registration).unwrap();
        assert_eq!(value["password2"], "s3cret");
        assert!(value.get("first_name").is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = LoginCredentials::new("alice", "hunter2");
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }

    #[test]
    fn test_refresh_url_joins_cleanly() {
        let endpoint = RefreshEndpoint::new(Client::new(), "http://localhost:8000/");
        assert_eq!(endpoint.url, "http://localhost:8000/api/auth/refresh/");
    }
}
