//! Playback device controller
//!
//! Maintains exactly one live connection to the vendor playback engine per
//! active session credential, translates user transport intent into SDK or
//! remote calls, and self-heals from the two recoverable vendor failure
//! signals: stale-credential errors and queue exhaustion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};

use crate::api::SpotifyApi;
use crate::error::Result;
use crate::session::SessionProvider;

use super::sdk::{
    OAuthTokenCallback, PlayerConfig, PlayerEvent, PlayerEventReceiver, PlayerHandle, PlayerSdk,
};
use super::state::DeviceState;

const DEFAULT_DEVICE_NAME: &str = "Spotify Web Client";

/// Settle time before rebuilding the player after a stale-credential error.
const AUTH_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Settle time after a "no list was loaded" playback error. Slightly longer
/// so the stale player is fully torn down before the retry.
const QUEUE_RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub device_name: String,
    pub auth_reconnect_delay: Duration,
    pub queue_reconnect_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            auth_reconnect_delay: AUTH_RECONNECT_DELAY,
            queue_reconnect_delay: QUEUE_RECONNECT_DELAY,
        }
    }
}

/// Owns the lifecycle of one playback device against the vendor SDK.
///
/// Invariant: `device_id` in the state record and the player handle are set
/// and cleared together; every place that drops one drops the other.
#[derive(Clone)]
pub struct PlayerController {
    sessions: Arc<dyn SessionProvider>,
    api: SpotifyApi,
    sdk: Arc<dyn PlayerSdk>,
    config: Arc<ControllerConfig>,
    state: Arc<RwLock<DeviceState>>,
    player: Arc<Mutex<Option<Arc<dyn PlayerHandle>>>>,
    liked_uris: Arc<RwLock<Vec<String>>>,
    reconnect_in_flight: Arc<AtomicBool>,
}

impl PlayerController {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        api: SpotifyApi,
        sdk: Arc<dyn PlayerSdk>,
    ) -> Self {
        Self::with_config(sessions, api, sdk, ControllerConfig::default())
    }

    pub fn with_config(
        sessions: Arc<dyn SessionProvider>,
        api: SpotifyApi,
        sdk: Arc<dyn PlayerSdk>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            sessions,
            api,
            sdk,
            config: Arc::new(config),
            state: Arc::new(RwLock::new(DeviceState::default())),
            player: Arc::new(Mutex::new(None)),
            liked_uris: Arc::new(RwLock::new(Vec::new())),
            reconnect_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the current device state.
    pub async fn state(&self) -> DeviceState {
        self.state.read().await.clone()
    }

    /// Provide the liked-tracks URIs used for library auto-continuation.
    pub async fn set_liked_tracks(&self, uris: Vec<String>) {
        *self.liked_uris.write().await = uris;
    }

    /// Connect the player once a credential and the SDK are both available.
    ///
    /// Waits for the vendor script when it has not loaded yet; does nothing
    /// when no credential exists.
    pub async fn initialize(&self) {
        if self.sessions.current_session().await.is_none() {
            tracing::debug!("no session credential, player stays uninitialized");
            return;
        }
        self.sdk.wait_until_loaded().await;
        self.connect_player().await;
    }

    /// The session credential changed: tear down the old player so no
    /// connection outlives its issuing credential, then reconnect.
    pub async fn handle_credential_change(&self) {
        self.shutdown().await;
        self.initialize().await;
    }

    /// Disconnect the player and reset the device record to empty.
    pub async fn shutdown(&self) {
        let previous = self.player.lock().await.take();
        if let Some(previous) = previous {
            previous.disconnect().await;
        }
        self.state.write().await.reset();
        tracing::info!("player disconnected and state cleared");
    }

    async fn connect_player(&self) {
        // Always tear down any existing handle first; makes overlapping
        // connect attempts converge on one live player.
        let previous = self.player.lock().await.take();
        if let Some(previous) = previous {
            previous.disconnect().await;
        }

        let sessions = self.sessions.clone();
        let get_oauth_token: OAuthTokenCallback = Arc::new(move || {
            let sessions = sessions.clone();
            // Re-fetch the live credential on every SDK token request; the
            // connection outlives individual tokens.
            Box::pin(async move { sessions.current_session().await.map(|s| s.access_token) })
        });

        let volume = self.state.read().await.volume;
        let (handle, events) = self.sdk.create_player(PlayerConfig {
            name: self.config.device_name.clone(),
            volume,
            get_oauth_token,
        });

        self.state.write().await.begin_connect();
        *self.player.lock().await = Some(handle.clone());
        self.spawn_event_loop(events);

        tracing::info!(device_name = %self.config.device_name, "connecting player");
        if !handle.connect().await {
            tracing::warn!("SDK refused the player connection");
        }
    }

    fn spawn_event_loop(&self, mut events: PlayerEventReceiver) {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_event(event).await;
            }
            tracing::debug!("player event stream closed");
        });
    }

    async fn handle_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ready { device_id } => {
                tracing::info!(%device_id, "player ready");
                self.state.write().await.on_ready(device_id);
            }
            PlayerEvent::NotReady { device_id } => {
                tracing::warn!(%device_id, "device went offline");
                self.state.write().await.on_not_ready();
                *self.player.lock().await = None;
            }
            PlayerEvent::StateChanged(snapshot) => {
                let outcome = self.state.write().await.apply_snapshot(snapshot);
                if outcome.track_changed {
                    let state = self.state.read().await;
                    tracing::debug!(
                        track = state.current_track.as_ref().map(|t| t.name.as_str()),
                        "track changed"
                    );
                }
                if outcome.queue_exhausted {
                    self.continue_with_library().await;
                }
            }
            PlayerEvent::AuthenticationError { message } => {
                tracing::warn!(%message, "player credential rejected, reconnecting");
                self.schedule_reconnect(self.config.auth_reconnect_delay).await;
            }
            PlayerEvent::PlaybackError { message } => {
                tracing::error!(%message, "playback error");
                if message.to_lowercase().contains("no list was loaded") {
                    self.schedule_reconnect(self.config.queue_reconnect_delay).await;
                }
            }
            PlayerEvent::InitializationError { message } => {
                tracing::error!(%message, "player initialization failed");
            }
            PlayerEvent::AccountError { message } => {
                tracing::error!(%message, "account not eligible for playback");
            }
        }
    }

    /// Tear down the stale player and rebuild it after `delay`.
    ///
    /// Single-flight: a reconnect already in progress absorbs further
    /// triggers, so overlapping auth and queue failures produce one rebuild.
    async fn schedule_reconnect(&self, delay: Duration) {
        if self.reconnect_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("reconnect already in flight, ignoring trigger");
            return;
        }

        self.state.write().await.begin_reconnect();
        let previous = self.player.lock().await.take();
        if let Some(previous) = previous {
            previous.disconnect().await;
        }

        tracing::info!(delay_ms = delay.as_millis() as u64, "scheduling player reconnect");
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.connect_player().await;
            controller.reconnect_in_flight.store(false, Ordering::SeqCst);
        });
    }

    /// End of an explicit queue: keep listening going with the whole liked
    /// library in randomized order.
    async fn continue_with_library(&self) {
        let Some(device_id) = self.state.read().await.device_id.clone() else {
            return;
        };
        let mut uris = self.liked_uris.read().await.clone();
        if uris.is_empty() {
            tracing::debug!("queue exhausted but no liked tracks to continue with");
            return;
        }

        uris.shuffle(&mut rand::thread_rng());

        tracing::info!(count = uris.len(), "queue exhausted, continuing with shuffled library");
        if let Err(e) = self.api.start_playback(&device_id, uris, Some(0)).await {
            tracing::error!(error = %e, "library continuation failed");
        }
    }

    /// Start playback of a single track on the current device.
    ///
    /// No-op when no device is ready.
    pub async fn play_track(&self, uri: &str) -> Result<()> {
        let Some(device_id) = self.state.read().await.device_id.clone() else {
            tracing::debug!(uri, "no device ready, ignoring play request");
            return Ok(());
        };
        self.api
            .start_playback(&device_id, vec![uri.to_string()], None)
            .await
    }

    /// Start playback of a track list at the given offset.
    pub async fn play_tracks(&self, uris: Vec<String>, start_index: usize) -> Result<()> {
        if uris.is_empty() {
            return Ok(());
        }
        let Some(device_id) = self.state.read().await.device_id.clone() else {
            tracing::debug!("no device ready, ignoring play request");
            return Ok(());
        };
        self.api
            .start_playback(&device_id, uris, Some(start_index))
            .await
    }

    /// The player handle, only when transport preconditions hold.
    ///
    /// The UI issues transport commands speculatively; commands against a
    /// half-initialized or idle device are silently dropped.
    async fn transport_player(&self) -> Option<Arc<dyn PlayerHandle>> {
        if !self.state.read().await.transport_ready() {
            return None;
        }
        self.player.lock().await.clone()
    }

    pub async fn toggle_play_pause(&self) {
        if let Some(player) = self.transport_player().await {
            player.toggle_play().await;
        }
    }

    pub async fn next_track(&self) {
        if let Some(player) = self.transport_player().await {
            player.next_track().await;
        }
    }

    pub async fn previous_track(&self) {
        if let Some(player) = self.transport_player().await {
            player.previous_track().await;
        }
    }

    pub async fn seek(&self, position_ms: u32) {
        if let Some(player) = self.transport_player().await {
            player.seek(position_ms).await;
        }
    }

    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        if let Some(player) = self.transport_player().await {
            player.set_volume(volume).await;
            self.state.write().await.volume = volume;
        }
    }
}
