//! Resilient request executor with session refresh and bounded retry
//!
//! Every logical API call goes through [`RequestExecutor::execute`]. The
//! executor owns all retry and credential-lifecycle decisions; callers only
//! ever see the final result or the final, already-classified error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ApiError, ErrorClass, Result};
use crate::session::{SessionProvider, SessionToken};

/// Called before each retry with the error that triggered it and the number
/// of the attempt that just failed.
pub type RetryCallback = Box<dyn Fn(&ApiError, u32) + Send + Sync>;

/// Retry configuration for one logical call.
pub struct RetryOptions {
    /// Retries after the initial attempt. 3 means up to 4 invocations.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub base_delay: Duration,
    pub on_retry: Option<RetryCallback>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            on_retry: None,
        }
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_on_retry(mut self, on_retry: impl Fn(&ApiError, u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(on_retry));
        self
    }
}

/// Outcome of the pure retry decision for one failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Fail,
}

/// Pure backoff policy, kept separate from the effectful session-refresh
/// step so the math is testable without mocking the network.
pub struct RetryPolicy;

impl RetryPolicy {
    /// Decide what to do after `attempt` failed with `error`.
    pub fn decide(
        error: &ApiError,
        attempt: u32,
        max_retries: u32,
        base_delay: Duration,
    ) -> RetryDecision {
        if error.class() == ErrorClass::Permanent || attempt > max_retries {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry {
            delay: Self::backoff_delay(error, attempt, base_delay),
        }
    }

    /// Rate limits get exponential cool-down; every other retryable error is
    /// probed on a fixed interval.
    pub fn backoff_delay(error: &ApiError, attempt: u32, base_delay: Duration) -> Duration {
        if error.status() == Some(429) {
            base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
        } else {
            base_delay
        }
    }
}

/// Executes operations against the Spotify Web API with credential
/// injection, failure classification, session refresh and bounded retry.
#[derive(Clone)]
pub struct RequestExecutor {
    sessions: Arc<dyn SessionProvider>,
}

impl RequestExecutor {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionProvider> {
        &self.sessions
    }

    /// Run `operation` with at-least-once semantics under transient failure.
    ///
    /// The operation receives a credential fetched fresh from the session
    /// provider for every attempt. Authentication errors trigger a session
    /// refresh before the retry; a failed refresh triggers the sign-in
    /// redirect and fails the call immediately. Permanent errors are never
    /// retried.
    pub async fn execute<T, F, Fut>(&self, operation: F, options: &RetryOptions) -> Result<T>
    where
        F: Fn(SessionToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;

        loop {
            let error = match self.sessions.current_session().await {
                Some(token) => match operation(token).await {
                    Ok(value) => return Ok(value),
                    Err(error) => error,
                },
                None => ApiError::MissingSession,
            };

            tracing::warn!(
                attempt,
                max_attempts = options.max_retries + 1,
                status = ?error.status(),
                error = %error,
                "API attempt failed"
            );

            if error.class() == ErrorClass::Authentication {
                match self.sessions.force_refresh().await {
                    Some(_) => {
                        tracing::info!("session refreshed, retrying with fresh credential");
                    }
                    None => {
                        tracing::error!("session refresh failed, redirecting to sign-in");
                        self.sessions.redirect_to_sign_in().await;
                        return Err(error);
                    }
                }
            }

            match RetryPolicy::decide(&error, attempt, options.max_retries, options.base_delay) {
                RetryDecision::Fail => return Err(error),
                RetryDecision::Retry { delay } => {
                    if let Some(on_retry) = &options.on_retry {
                        on_retry(&error, attempt);
                    }
                    tracing::debug!(
                        delay_ms = delay.as_millis() as u64,
                        attempt,
                        "waiting before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }
}
