//! Session credential types and the provider seam
//!
//! The crate never owns or refreshes credentials itself. It asks the provider
//! for the current credential before every request, because the provider may
//! have rotated the token at any point in between.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// An opaque bearer credential with its wall-clock expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// True when fewer than `seconds` remain before expiry.
    pub fn expires_within(&self, seconds: i64) -> bool {
        (self.expires_at - Utc::now()).num_seconds() < seconds
    }
}

/// The external identity/session collaborator.
///
/// Implementations wrap whatever auth layer hosts this crate. The executor
/// and the playback controller only ever read fresh credentials through this
/// trait; they never cache a token across more than one logical request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The live credential, if any.
    async fn current_session(&self) -> Option<SessionToken>;

    /// Force the provider to mint a fresh credential.
    ///
    /// Returns the refreshed credential, or `None` when the underlying
    /// session can no longer be renewed.
    async fn force_refresh(&self) -> Option<SessionToken>;

    /// Send the user back through interactive sign-in.
    ///
    /// Fire-and-forget; called only after a failed refresh.
    async fn redirect_to_sign_in(&self);
}
