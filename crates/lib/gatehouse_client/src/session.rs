//! Stored client session: token pair plus a last-activity timestamp for
//! the inactivity policy.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Token pair as held by the client.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Process-wide session state, shared by every request in flight.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionState>>,
}

#[derive(Default)]
struct SessionState {
    tokens: Option<SessionTokens>,
    last_activity: Option<Instant>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored token pair. Counts as activity.
    pub fn install(&self, tokens: SessionTokens) {
        let mut state = self.inner.lock().unwrap();
        state.tokens = Some(tokens);
        state.last_activity = Some(Instant::now());
    }

    /// Drop all stored credentials.
    pub fn clear(&self) {
        let mut state = self.inner.lock().unwrap();
        state.tokens = None;
        state.last_activity = None;
    }

    /// Current access token, if a session exists.
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    /// Refresh token, but only while it is still exchangeable at `now`.
    pub fn valid_refresh_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .tokens
            .as_ref()
            .filter(|t| now < t.refresh_token_expires_at)
            .map(|t| t.refresh_token.clone())
    }

    /// Refresh token regardless of expiry (for logout revocation).
    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
    }

    /// Record activity for the inactivity policy.
    pub fn touch(&self) {
        self.inner.lock().unwrap().last_activity = Some(Instant::now());
    }

    /// Time since the session was last used, if one exists.
    pub fn idle_for(&self) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap()
            .last_activity
            .map(|at| at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    fn tokens(refresh_offset_secs: i64) -> SessionTokens {
        SessionTokens {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            refresh_token_expires_at: Utc::now() + ChronoDuration::seconds(refresh_offset_secs),
        }
    }

    #[test]
    fn install_then_read_back() {
        let store = SessionStore::new();
        assert!(store.access_token().is_none());
        store.install(tokens(3600));
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert!(store.idle_for().is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let store = SessionStore::new();
        store.install(tokens(3600));
        store.clear();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.idle_for().is_none());
    }

    #[test]
    fn expired_refresh_token_is_not_usable() {
        let store = SessionStore::new();
        store.install(tokens(-1));
        assert!(store.valid_refresh_token(Utc::now()).is_none());
        // Still visible for logout revocation.
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn unexpired_refresh_token_is_usable() {
        let store = SessionStore::new();
        store.install(tokens(3600));
        assert_eq!(
            store.valid_refresh_token(Utc::now()).as_deref(),
            Some("refresh")
        );
    }
}
