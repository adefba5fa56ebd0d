use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::session::{AuthState, SessionEvent, User};

/// Capacity of the session event channel; slow subscribers lag rather than block
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Observable session state plus a stream of lifecycle events.
///
/// Cloning shares the same channels.
#[derive(Clone)]
pub struct SessionEvents {
    state: watch::Sender<AuthState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(initial: AuthState) -> Self {
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { state, events }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn logged_in(&self, user: User) {
        self.state.send_replace(AuthState::Authenticated(user.clone()));
        self.publish(SessionEvent::LoggedIn(user));
    }

    /// Swap the user snapshot without announcing a new login
    pub fn user_updated(&self, user: User) {
        self.state.send_replace(AuthState::Authenticated(user));
    }

    pub fn token_refreshed(&self) {
        self.publish(SessionEvent::TokenRefreshed);
    }

    pub fn logged_out(&self) {
        self.state.send_replace(AuthState::Unauthenticated);
        self.publish(SessionEvent::LoggedOut);
    }

    /// The session died underneath the user (refresh failed)
    pub fn invalidated(&self) {
        self.state.send_replace(AuthState::Unauthenticated);
        self.publish(SessionEvent::Invalidated);
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("No session event subscribers");
        }
    }
}
