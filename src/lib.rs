//! Resilient Spotify Web API client core with a playback device controller.
//!
//! Two cooperating pieces, both built for a single-threaded, event-driven
//! host:
//!
//! - [`executor::RequestExecutor`] runs API calls with credential injection,
//!   failure classification, automatic session refresh and bounded retry.
//!   [`api::SpotifyApi`] is the JSON convenience layer on top of it.
//! - [`player::PlayerController`] owns one playback device against the
//!   vendor in-browser SDK: it tracks readiness and the current track, and
//!   auto-recovers from stale credentials and queue exhaustion.
//!
//! The identity provider, the Web API and the playback SDK stay external;
//! they are reached through the [`session::SessionProvider`] and
//! [`player::PlayerSdk`] seams.

pub mod api;
pub mod error;
pub mod executor;
pub mod logging;
pub mod player;
pub mod session;

pub use api::{search_user_library, SpotifyApi};
pub use error::{ApiError, ErrorClass};
pub use executor::{RequestExecutor, RetryDecision, RetryOptions, RetryPolicy};
pub use player::{ConnectionState, DeviceState, PlayerController, PlayerEvent, PlayerSdk};
pub use session::{SessionProvider, SessionToken};
