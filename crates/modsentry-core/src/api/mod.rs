//! REST API client module for the moderation service.
//!
//! Every call is described by an immutable `RequestDescriptor` and sent
//! through the `RequestGateway`, which attaches the bearer token and handles
//! access-token expiry. `AuthApi` covers the credential-exchange endpoints,
//! `ModerationApi` the policy and moderation endpoints.

pub mod auth;
pub mod error;
pub mod gateway;
pub mod moderation;
pub mod request;

pub use auth::{AuthApi, AuthResponse, LoginCredentials, RefreshEndpoint, Registration};
pub use error::ApiError;
pub use gateway::RequestGateway;
pub use moderation::ModerationApi;
pub use request::{AuthMode, FilePart, RequestBody, RequestDescriptor};
