//! Abstraction over the vendor in-browser playback SDK
//!
//! The real SDK is a script loaded by the hosting page that exposes a
//! constructible player object and pushes asynchronous events. The
//! controller drives it exclusively through these traits, so tests can
//! substitute a scripted fake.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

/// Callback the SDK invokes whenever it needs a fresh OAuth token.
///
/// Must re-fetch the live session on every call; the player connection can
/// outlive several credential refreshes.
pub type OAuthTokenCallback = Arc<dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Construction parameters for a player instance.
#[derive(Clone)]
pub struct PlayerConfig {
    pub name: String,
    pub volume: f32,
    pub get_oauth_token: OAuthTokenCallback,
}

/// A track as reported by the playback SDK.
#[derive(Clone, Debug, PartialEq)]
pub struct SdkTrack {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub duration_ms: u32,
}

/// One `player_state_changed` payload.
#[derive(Clone, Debug, Default)]
pub struct PlaybackSnapshot {
    pub current_track: Option<SdkTrack>,
    pub paused: bool,
    pub position_ms: u32,
    pub duration_ms: u32,
    /// Upcoming tracks relative to the current one.
    pub next_tracks: Vec<SdkTrack>,
    /// Already-played tracks relative to the current one.
    pub previous_tracks: Vec<SdkTrack>,
}

/// Asynchronous events pushed by the SDK.
#[derive(Clone, Debug)]
pub enum PlayerEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    StateChanged(PlaybackSnapshot),
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
}

pub type PlayerEventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;
pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;

/// A live player instance created by the SDK.
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// Open the device connection. The `ready` event follows asynchronously.
    async fn connect(&self) -> bool;
    async fn disconnect(&self);
    async fn toggle_play(&self);
    async fn next_track(&self);
    async fn previous_track(&self);
    async fn seek(&self, position_ms: u32);
    async fn set_volume(&self, volume: f32);
}

/// The SDK bootstrap collaborator.
#[async_trait]
pub trait PlayerSdk: Send + Sync {
    /// Resolves once the vendor script has loaded.
    ///
    /// Stands in for the one-shot global ready callback the script fires;
    /// resolves immediately when the SDK is already available.
    async fn wait_until_loaded(&self);

    /// Construct a player instance and the stream of its events.
    fn create_player(&self, config: PlayerConfig) -> (Arc<dyn PlayerHandle>, PlayerEventReceiver);
}
