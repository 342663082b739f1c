#![allow(dead_code)]

use std::sync::atomic::AtomicU32;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use spotify_web_client::session::{SessionProvider, SessionToken};

fn token(value: &str) -> SessionToken {
    SessionToken::new(value, Utc::now() + chrono::Duration::hours(1))
}

/// Scripted session provider for integration tests.
pub struct TestSessions {
    current: Mutex<Option<SessionToken>>,
    refresh_to: Mutex<Option<SessionToken>>,
    pub refresh_calls: AtomicU32,
    pub redirects: AtomicU32,
}

impl TestSessions {
    pub fn with_token(value: &str) -> Self {
        Self {
            current: Mutex::new(Some(token(value))),
            refresh_to: Mutex::new(None),
            refresh_calls: AtomicU32::new(0),
            redirects: AtomicU32::new(0),
        }
    }

    /// A forced refresh will rotate the credential to `value`.
    pub fn refreshing_to(self, value: &str) -> Self {
        *self.refresh_to.lock().unwrap() = Some(token(value));
        self
    }
}

#[async_trait]
impl SessionProvider for TestSessions {
    async fn current_session(&self) -> Option<SessionToken> {
        self.current.lock().unwrap().clone()
    }

    async fn force_refresh(&self) -> Option<SessionToken> {
        self.refresh_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let refreshed = self.refresh_to.lock().unwrap().clone();
        *self.current.lock().unwrap() = refreshed.clone();
        refreshed
    }

    async fn redirect_to_sign_in(&self) {
        self.redirects
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
