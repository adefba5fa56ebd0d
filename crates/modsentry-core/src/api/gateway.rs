//! Single choke point for every outbound API call.
//!
//! The gateway attaches the current bearer token, recognizes an expired
//! token (HTTP 401), drives exactly one refresh-and-retry cycle through the
//! `RefreshCoordinator`, and otherwise hands errors back untouched.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{CredentialStore, RefreshCoordinator};

use super::request::{AuthMode, RequestBody, RequestDescriptor};
use super::ApiError;

/// Clone is cheap - the HTTP client, store and coordinator are all shared.
#[derive(Clone)]
pub struct RequestGateway {
    client: Client,
    base_url: String,
    store: CredentialStore,
    refresh: RefreshCoordinator,
}

impl RequestGateway {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        store: CredentialStore,
        refresh: RefreshCoordinator,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            refresh,
        }
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Send a request, refreshing the session and retrying once if the
    /// access token has expired. Returns only successful responses.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<Response, ApiError> {
        let token = self.store.load_access_token();
        if request.auth() == AuthMode::Required && token.is_none() {
            debug!(path = request.path(), "No session, not sending authenticated request");
            return Err(ApiError::SessionExpired);
        }

        let response = self.dispatch(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || request.auth() == AuthMode::Optional {
            return Self::check_response(response, request.auth()).await;
        }

        if request.has_been_retried() {
            warn!(path = request.path(), "Unauthorized on retried request, giving up");
            return Err(ApiError::Unauthorized);
        }

        let token = match self.store.load_access_token() {
            None => {
                debug!(path = request.path(), "Session ended while request was in flight");
                return Err(ApiError::SessionExpired);
            }
            // Sent with a token that has since been replaced, retry with the new one
            Some(current) if token.as_deref() != Some(current.as_str()) => {
                debug!(path = request.path(), "Access token already renewed, retrying");
                current
            }
            Some(_) => {
                debug!(path = request.path(), "Access token rejected, requesting refresh");
                self.refresh
                    .request_refresh()
                    .await
                    .map_err(|_| ApiError::SessionExpired)?
            }
        };

        let retry = request.retried();
        let response = self.dispatch(&retry, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = retry.path(), "Unauthorized after token refresh, giving up");
            return Err(ApiError::Unauthorized);
        }
        Self::check_response(response, retry.auth()).await
    }

    /// Send and deserialize a JSON response body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!(
                "Failed to parse JSON response from {}: {}",
                request.path(),
                e
            ))
        })
    }

    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self.client.request(request.method().clone(), &url);

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => {
                builder.multipart(RequestDescriptor::multipart_form(parts)?)
            }
        };

        debug!(
            method = %request.method(),
            path = request.path(),
            attempt = request.attempt(),
            "Sending request"
        );
        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response, auth: AuthMode) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // Credential endpoints answer bad logins with 401 and an error body
        if status == StatusCode::UNAUTHORIZED && auth == AuthMode::Optional {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Err(ApiError::from_status(status, &body))
    }
}
