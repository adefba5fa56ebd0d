//! Single-flight renewal of an expired access token.
//!
//! Any number of callers may discover an expired token at the same moment.
//! The first one starts the refresh; everyone arriving while it is in flight
//! gets a clone of the same shared future and settles with the same outcome.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::api::ApiError;

use super::error::AuthError;
use super::events::SessionEvents;
use super::store::CredentialStore;

/// Exchanges a refresh token for a new access token.
///
/// Implemented over HTTP by `api::auth::RefreshEndpoint`.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<String, ApiError>>;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, AuthError>>>;
type Slot = Mutex<Option<RefreshFuture>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    store: CredentialStore,
    events: SessionEvents,
    refresher: Arc<dyn TokenRefresher>,
    in_flight: Arc<Slot>,
}

impl RefreshCoordinator {
    pub fn new(
        store: CredentialStore,
        events: SessionEvents,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            store,
            events,
            refresher,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> RefreshState {
        if lock(&self.in_flight).is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Obtain a fresh access token, joining an in-flight refresh if there is one.
    ///
    /// On failure the session has already been cleared and announced as
    /// invalidated by the time this returns.
    pub async fn request_refresh(&self) -> Result<String, AuthError> {
        let refresh = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let refresh = Self::run(
                        self.store.clone(),
                        self.events.clone(),
                        Arc::clone(&self.refresher),
                        Arc::downgrade(&self.in_flight),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };
        refresh.await
    }

    async fn run(
        store: CredentialStore,
        events: SessionEvents,
        refresher: Arc<dyn TokenRefresher>,
        slot: Weak<Slot>,
    ) -> Result<String, AuthError> {
        let outcome = Self::refresh_once(&store, &events, refresher.as_ref()).await;
        // Back to idle before any waiter resumes
        if let Some(slot) = slot.upgrade() {
            lock(&slot).take();
        }
        outcome
    }

    async fn refresh_once(
        store: &CredentialStore,
        events: &SessionEvents,
        refresher: &dyn TokenRefresher,
    ) -> Result<String, AuthError> {
        let (generation, refresh_token) = store.refresh_token_snapshot();
        let Some(refresh_token) = refresh_token else {
            warn!("No refresh token stored, invalidating session");
            Self::invalidate(store, events, generation);
            return Err(AuthError::SessionExpired);
        };

        debug!(generation, "Refreshing access token");
        match refresher.refresh(&refresh_token).await {
            Ok(access) => {
                // A logout or new login while the call was out wins over this result
                if !store.set_access_token(generation, &access) {
                    info!("Session changed during token refresh, discarding new token");
                    return Err(AuthError::SessionExpired);
                }
                events.token_refreshed();
                info!("Access token refreshed");
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, invalidating session");
                Self::invalidate(store, events, generation);
                Err(AuthError::SessionExpired)
            }
        }
    }

    fn invalidate(store: &CredentialStore, events: &SessionEvents, generation: u64) {
        if store.clear_if_current(generation) {
            events.invalidated();
        }
    }
}

fn lock(slot: &Slot) -> std::sync::MutexGuard<'_, Option<RefreshFuture>> {
    // The critical sections never panic, a poisoned slot is still consistent
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::{broadcast, Notify};

    use super::*;
    use crate::auth::session::{AuthState, SessionEvent, TokenPair, User};
    use crate::auth::storage::MemoryStore;

    /// Blocks every refresh until released, then answers with `result`
    struct GatedRefresher {
        calls: AtomicUsize,
        gate: Notify,
        result: Result<String, u16>,
    }

    impl GatedRefresher {
        fn new(result: Result<String, u16>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                result,
            })
        }
    }

    impl TokenRefresher for GatedRefresher {
        fn refresh<'a>(
            &'a self,
            _refresh_token: &'a str,
        ) -> BoxFuture<'a, Result<String, ApiError>> {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.gate.notified().await;
                match &self.result {
                    Ok(token) => Ok(token.clone()),
                    Err(status) => Err(ApiError::from_status(
                        reqwest::StatusCode::from_u16(*status).unwrap(),
                        "",
                    )),
                }
            }
            .boxed()
        }
    }

    fn logged_in_store() -> (CredentialStore, SessionEvents) {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: String::new(),
            role: None,
            first_name: None,
            last_name: None,
        };
        store.save(
            &TokenPair {
                access: "tok1".to_string(),
                refresh: "ref1".to_string(),
            },
            &user,
        );
        (store, SessionEvents::new(AuthState::Authenticated(user)))
    }

    async fn wait_for_calls(refresher: &GatedRefresher, n: usize) {
        while refresher.calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let (store, events) = logged_in_store();
        let refresher = GatedRefresher::new(Ok("tok2".to_string()));
        let coordinator = RefreshCoordinator::new(store.clone(), events, refresher.clone());

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.request_refresh().await })
            })
            .collect();

        wait_for_calls(&refresher, 1).await;
        assert_eq!(coordinator.state(), RefreshState::Refreshing);
        refresher.gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("tok2".to_string()));
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(store.load_access_token().as_deref(), Some("tok2"));
    }

    #[tokio::test]
    async fn test_failed_refresh_invalidates_once() {
        let (store, events) = logged_in_store();
        let mut rx = events.subscribe();
        let refresher = GatedRefresher::new(Err(401));
        let coordinator =
            RefreshCoordinator::new(store.clone(), events.clone(), refresher.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.request_refresh().await })
            })
            .collect();

        wait_for_calls(&refresher, 1).await;
        refresher.gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err(AuthError::SessionExpired));
        }
        assert!(!store.is_authenticated());
        assert!(store.load_refresh_token().is_none());
        assert!(!events.current().is_authenticated());

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Invalidated);
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_network() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        let events = SessionEvents::new(AuthState::Unauthenticated);
        let refresher = GatedRefresher::new(Ok("unused".to_string()));
        let coordinator = RefreshCoordinator::new(store, events, refresher.clone());

        assert_eq!(
            coordinator.request_refresh().await,
            Err(AuthError::SessionExpired)
        );
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_hit_network() {
        let (store, events) = logged_in_store();
        let refresher = GatedRefresher::new(Ok("tok2".to_string()));
        let coordinator = RefreshCoordinator::new(store, events, refresher.clone());

        for expected_calls in 1..=2 {
            let task = {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.request_refresh().await })
            };
            wait_for_calls(&refresher, expected_calls).await;
            refresher.gate.notify_one();
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_settling_after_logout_is_discarded() {
        let (store, events) = logged_in_store();
        let mut rx = events.subscribe();
        let refresher = GatedRefresher::new(Ok("tok2".to_string()));
        let coordinator = RefreshCoordinator::new(store.clone(), events, refresher.clone());

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.request_refresh().await })
        };
        wait_for_calls(&refresher, 1).await;
        store.clear();
        refresher.gate.notify_one();

        assert_eq!(task.await.unwrap(), Err(AuthError::SessionExpired));
        assert!(store.load_access_token().is_none());
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_failed_refresh_spares_newer_session() {
        let (store, events) = logged_in_store();
        let mut rx = events.subscribe();
        let refresher = GatedRefresher::new(Err(401));
        let coordinator =
            RefreshCoordinator::new(store.clone(), events.clone(), refresher.clone());

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.request_refresh().await })
        };
        wait_for_calls(&refresher, 1).await;
        let user = store.load_user().unwrap();
        store.save(
            &TokenPair {
                access: "tok9".to_string(),
                refresh: "ref9".to_string(),
            },
            &user,
        );
        refresher.gate.notify_one();

        assert_eq!(task.await.unwrap(), Err(AuthError::SessionExpired));
        assert_eq!(store.load_access_token().as_deref(), Some("tok9"));
        assert!(events.current().is_authenticated());
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }
}
