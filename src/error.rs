//! Spotify API error taxonomy and user-facing messaging

use std::time::Duration;
use thiserror::Error;

/// How long an error notification should stay on screen.
///
/// Auth errors dismiss faster because a refresh or sign-in redirect is
/// already underway by the time the notification is shown.
const AUTH_NOTIFICATION_DURATION: Duration = Duration::from_secs(3);
const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

/// An error observed while talking to the Spotify Web API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with a non-2xx status code.
    #[error("Spotify API error: {status} {message}")]
    Status { status: u16, message: String },

    /// The request never produced a status code (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The session provider had no credential to attach to the request.
    #[error("no session credential available")]
    MissingSession,

    /// The response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Disjoint retry categories for [`ApiError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// 401/403 or a missing credential; recoverable via session refresh.
    Authentication,
    /// 429, 5xx or no status at all; recoverable via timed retry.
    Transient,
    /// Everything else; never retried.
    Permanent,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::MissingSession => ErrorClass::Authentication,
            ApiError::Network(_) => ErrorClass::Transient,
            ApiError::Parse(_) => ErrorClass::Permanent,
            ApiError::Status { status, .. } => match status {
                401 | 403 => ErrorClass::Authentication,
                429 => ErrorClass::Transient,
                500..=599 => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
        }
    }

    /// Short title for an error notification.
    pub fn title(&self) -> &'static str {
        match self.status() {
            None => match self {
                ApiError::MissingSession => "Session Expired",
                _ => "Connection Error",
            },
            Some(401) => "Session Expired",
            Some(403) => "Access Denied",
            Some(404) => "Not Found",
            Some(429) => "Rate Limited",
            Some(500..=599) => "Server Error",
            Some(_) => "Error",
        }
    }

    /// Plain-language message for an error notification.
    pub fn user_message(&self) -> &'static str {
        match self.status() {
            None => match self {
                ApiError::MissingSession => {
                    "Your session has expired. The page will refresh automatically."
                }
                _ => "Network connection failed. Please check your internet connection and try again.",
            },
            Some(401) => "Your session has expired. The page will refresh automatically.",
            Some(403) => "Access denied. Some features require a Spotify Premium subscription.",
            Some(404) => "The requested content was not found. It may have been removed or moved.",
            Some(429) => "Too many requests. Please wait a moment before trying again.",
            Some(500..=599) => {
                "Spotify is experiencing technical difficulties. Please try again in a few minutes."
            }
            Some(_) => "Something went wrong. Please try again, and contact support if the problem persists.",
        }
    }

    pub fn notification_duration(&self) -> Duration {
        if self.class() == ErrorClass::Authentication {
            AUTH_NOTIFICATION_DURATION
        } else {
            DEFAULT_NOTIFICATION_DURATION
        }
    }
}

/// Result type for Spotify API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
