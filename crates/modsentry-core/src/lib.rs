//! modsentry-core - session, authentication and API access for the
//! modsentry moderation service.
//!
//! The pieces, leaves first:
//! - [`auth::CredentialStore`]: durable access/refresh tokens and user profile
//! - [`auth::RefreshCoordinator`]: single-flight token refresh
//! - [`api::RequestGateway`]: bearer attach plus one transparent retry on expiry
//! - [`SessionManager`]: login, registration, logout and session state

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session_manager;

pub use config::Config;
pub use session_manager::{AuthOutcome, SessionManager};
