//! Playback device controller and its SDK seam
//!
//! - `sdk`: traits and event types abstracting the vendor playback SDK
//! - `state`: explicit connection state machine and device record
//! - `controller`: the controller that drives the SDK and self-heals

pub mod controller;
pub mod sdk;
pub mod state;

pub use controller::{ControllerConfig, PlayerController};
pub use sdk::{
    OAuthTokenCallback, PlaybackSnapshot, PlayerConfig, PlayerEvent, PlayerEventReceiver,
    PlayerEventSender, PlayerHandle, PlayerSdk, SdkTrack,
};
pub use state::{ConnectionState, DeviceState, SnapshotOutcome};
