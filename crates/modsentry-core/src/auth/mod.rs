//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: durable tokens + user profile over a `KeyValueStore`
//! - `RefreshCoordinator`: single-flight renewal of the access token
//! - `SessionEvents`: observable auth state and lifecycle events
//!
//! Sessions are persisted to disk (or the OS keychain) and survive restarts
//! until logout or a failed refresh tears them down.

pub mod credentials;
pub mod error;
pub mod events;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;

pub use credentials::KeyringStore;
pub use error::AuthError;
pub use events::SessionEvents;
pub use refresh::{RefreshCoordinator, RefreshState, TokenRefresher};
pub use session::{AuthState, SessionEvent, TokenPair, User};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::CredentialStore;
