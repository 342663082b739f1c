//! Explicit connection state machine and playback device record
//!
//! The device record is the single mutable value the controller owns. All
//! transitions go through the methods here so the reconnect guards stay
//! independently testable.

use super::sdk::{PlaybackSnapshot, SdkTrack};

pub const DEFAULT_VOLUME: f32 = 0.5;

/// Lifecycle of the connection to the vendor playback engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No credential yet, or the SDK script has not loaded.
    #[default]
    Uninitialized,
    /// Player constructed and `connect()` issued; awaiting `ready`.
    Connecting,
    /// Device id known. Idle until a track is loaded.
    Ready,
    /// Old player torn down after a failure signal; a delayed reconnect is
    /// pending.
    Reconnecting,
}

/// What applying a `player_state_changed` snapshot revealed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// The current-track id differs from the previous one.
    pub track_changed: bool,
    /// A track change landed on the end of an explicit queue: nothing ahead,
    /// something behind.
    pub queue_exhausted: bool,
}

/// Mutable state of the one playback device this controller owns.
///
/// `device_id` is set and cleared together with the controller's player
/// handle; the controller enforces that pairing.
#[derive(Clone, Debug)]
pub struct DeviceState {
    pub connection: ConnectionState,
    pub device_id: Option<String>,
    pub current_track: Option<SdkTrack>,
    pub is_paused: bool,
    pub position_ms: u32,
    pub duration_ms: u32,
    pub volume: f32,
    pub next_tracks: Vec<SdkTrack>,
    pub previous_tracks: Vec<SdkTrack>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Uninitialized,
            device_id: None,
            current_track: None,
            is_paused: true,
            position_ms: 0,
            duration_ms: 0,
            volume: DEFAULT_VOLUME,
            next_tracks: Vec::new(),
            previous_tracks: Vec::new(),
        }
    }
}

impl DeviceState {
    /// Transport commands are only forwarded when a device and a loaded
    /// track both exist.
    pub fn transport_ready(&self) -> bool {
        self.device_id.is_some() && self.current_track.is_some()
    }

    /// A new player has been constructed and `connect()` issued.
    pub fn begin_connect(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// A failure signal tore the player down; reconnect pending.
    pub fn begin_reconnect(&mut self) {
        self.connection = ConnectionState::Reconnecting;
        self.device_id = None;
        self.current_track = None;
        self.is_paused = true;
    }

    /// Vendor `ready` event.
    pub fn on_ready(&mut self, device_id: String) {
        self.connection = ConnectionState::Ready;
        self.device_id = Some(device_id);
    }

    /// Vendor `not_ready` event: the device went offline.
    pub fn on_not_ready(&mut self) {
        self.connection = ConnectionState::Uninitialized;
        self.device_id = None;
    }

    /// Apply a `player_state_changed` snapshot and report what changed.
    pub fn apply_snapshot(&mut self, snapshot: PlaybackSnapshot) -> SnapshotOutcome {
        let previous_id = self.current_track.as_ref().map(|t| t.id.clone());
        let new_id = snapshot.current_track.as_ref().map(|t| t.id.clone());
        let track_changed = new_id.is_some() && new_id != previous_id;

        self.current_track = snapshot.current_track;
        self.is_paused = snapshot.paused;
        self.position_ms = snapshot.position_ms;
        self.duration_ms = snapshot.duration_ms;
        self.next_tracks = snapshot.next_tracks;
        self.previous_tracks = snapshot.previous_tracks;

        SnapshotOutcome {
            track_changed,
            queue_exhausted: track_changed
                && self.next_tracks.is_empty()
                && !self.previous_tracks.is_empty(),
        }
    }

    /// Credential change or unmount: drop everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
