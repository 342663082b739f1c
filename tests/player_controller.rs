//! Integration tests for the playback device controller against a scripted
//! SDK fake and a mock HTTP server.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::TestSessions;
use spotify_web_client::api::SpotifyApi;
use spotify_web_client::player::{
    ConnectionState, ControllerConfig, PlaybackSnapshot, PlayerConfig, PlayerController,
    PlayerEvent, PlayerEventReceiver, PlayerEventSender, PlayerHandle, PlayerSdk, SdkTrack,
};

/// Player fake that records every SDK call.
struct FakePlayer {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PlayerHandle for FakePlayer {
    async fn connect(&self) -> bool {
        self.calls.lock().unwrap().push("connect".to_string());
        true
    }

    async fn disconnect(&self) {
        self.calls.lock().unwrap().push("disconnect".to_string());
    }

    async fn toggle_play(&self) {
        self.calls.lock().unwrap().push("toggle_play".to_string());
    }

    async fn next_track(&self) {
        self.calls.lock().unwrap().push("next_track".to_string());
    }

    async fn previous_track(&self) {
        self.calls.lock().unwrap().push("previous_track".to_string());
    }

    async fn seek(&self, position_ms: u32) {
        self.calls.lock().unwrap().push(format!("seek:{position_ms}"));
    }

    async fn set_volume(&self, volume: f32) {
        self.calls.lock().unwrap().push(format!("set_volume:{volume}"));
    }
}

/// SDK fake handing out scripted players and exposing their event senders.
struct FakeSdk {
    calls: Arc<Mutex<Vec<String>>>,
    senders: Mutex<Vec<PlayerEventSender>>,
    players_created: AtomicU32,
}

impl FakeSdk {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            senders: Mutex::new(Vec::new()),
            players_created: AtomicU32::new(0),
        })
    }

    fn send(&self, event: PlayerEvent) {
        self.senders
            .lock()
            .unwrap()
            .last()
            .expect("a player was created")
            .send(event)
            .expect("event loop is alive");
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerSdk for FakeSdk {
    async fn wait_until_loaded(&self) {}

    fn create_player(&self, _config: PlayerConfig) -> (Arc<dyn PlayerHandle>, PlayerEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        self.players_created.fetch_add(1, Ordering::SeqCst);
        let player = FakePlayer {
            calls: self.calls.clone(),
        };
        (Arc::new(player), rx)
    }
}

fn track(id: &str) -> SdkTrack {
    SdkTrack {
        id: id.to_string(),
        uri: format!("spotify:track:{id}"),
        name: id.to_string(),
        artists: vec!["artist".to_string()],
        album: "album".to_string(),
        duration_ms: 180_000,
    }
}

fn snapshot(current: &str, next: &[&str], previous: &[&str]) -> PlaybackSnapshot {
    PlaybackSnapshot {
        current_track: Some(track(current)),
        paused: false,
        position_ms: 0,
        duration_ms: 180_000,
        next_tracks: next.iter().map(|id| track(id)).collect(),
        previous_tracks: previous.iter().map(|id| track(id)).collect(),
    }
}

fn test_config() -> ControllerConfig {
    ControllerConfig {
        device_name: "Test Player".to_string(),
        auth_reconnect_delay: Duration::from_millis(50),
        queue_reconnect_delay: Duration::from_millis(50),
    }
}

async fn controller_with(
    server: &MockServer,
    sdk: Arc<FakeSdk>,
) -> (PlayerController, Arc<TestSessions>) {
    let sessions = Arc::new(TestSessions::with_token("t"));
    let api = SpotifyApi::with_base_url(sessions.clone(), server.uri()).expect("client");
    let controller = PlayerController::with_config(sessions.clone(), api, sdk, test_config());
    (controller, sessions)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn transport_commands_are_noops_without_a_track() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;

    // Ready but idle: every transport command is silently dropped.
    controller.toggle_play_pause().await;
    controller.next_track().await;
    controller.previous_track().await;
    controller.seek(5_000).await;
    controller.set_volume(0.8).await;

    assert_eq!(sdk.calls(), vec!["connect".to_string()]);
    let state = controller.state().await;
    assert_eq!(state.connection, ConnectionState::Ready);
    assert_eq!(state.device_id.as_deref(), Some("device-1"));
}

#[tokio::test]
async fn transport_commands_delegate_once_a_track_is_loaded() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::StateChanged(snapshot("a", &["b"], &[])));
    settle().await;

    controller.toggle_play_pause().await;
    controller.seek(5_000).await;
    controller.set_volume(0.8).await;

    let calls = sdk.calls();
    assert!(calls.contains(&"toggle_play".to_string()));
    assert!(calls.contains(&"seek:5000".to_string()));
    assert!(calls.contains(&"set_volume:0.8".to_string()));
    assert_eq!(controller.state().await.volume, 0.8);
}

#[tokio::test]
async fn no_list_playback_error_triggers_delayed_reconnect() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::StateChanged(snapshot("a", &[], &[])));
    settle().await;

    sdk.send(PlayerEvent::PlaybackError {
        message: "Playback error: no list was loaded".to_string(),
    });
    settle().await;

    let state = controller.state().await;
    assert_eq!(state.connection, ConnectionState::Reconnecting);
    assert!(state.current_track.is_none());
    assert!(state.is_paused);
    assert!(state.device_id.is_none());
    assert!(sdk.calls().contains(&"disconnect".to_string()));

    // After the settle delay a fresh player is constructed and connected.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sdk.players_created.load(Ordering::SeqCst), 2);
    assert_eq!(controller.state().await.connection, ConnectionState::Connecting);
}

#[tokio::test]
async fn unrelated_playback_errors_do_not_reconnect() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::PlaybackError {
        message: "Playback error: item is region restricted".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(sdk.players_created.load(Ordering::SeqCst), 1);
    assert_eq!(controller.state().await.connection, ConnectionState::Ready);
}

#[tokio::test]
async fn overlapping_failure_signals_reconnect_once() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;

    // A stale token surfacing exactly when the queue runs out.
    sdk.send(PlayerEvent::AuthenticationError {
        message: "token expired".to_string(),
    });
    sdk.send(PlayerEvent::PlaybackError {
        message: "no list was loaded".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Initial player plus exactly one rebuild.
    assert_eq!(sdk.players_created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn queue_exhaustion_continues_with_shuffled_library() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/me/player/play"))
        .and(query_param("device_id", "device-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    let liked: Vec<String> = (0..5).map(|i| format!("spotify:track:liked-{i}")).collect();
    controller.set_liked_tracks(liked.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::StateChanged(snapshot("a", &["b"], &[])));
    sdk.send(PlayerEvent::StateChanged(snapshot("b", &[], &["a"])));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 1);

    let body: Value = requests[0].body_json().expect("json body");
    let mut sent: Vec<String> = body["uris"]
        .as_array()
        .expect("uris array")
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(body["offset"]["position"], 0);

    // The played list is a permutation of the liked library.
    let mut expected = liked;
    sent.sort();
    expected.sort();
    assert_eq!(sent, expected);
}

#[tokio::test]
async fn repeated_snapshots_of_the_same_track_do_not_retrigger_continuation() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/me/player/play"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;
    controller
        .set_liked_tracks(vec!["spotify:track:liked-0".to_string()])
        .await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::StateChanged(snapshot("a", &["b"], &[])));
    sdk.send(PlayerEvent::StateChanged(snapshot("b", &[], &["a"])));
    // Position updates for the same track keep arriving.
    sdk.send(PlayerEvent::StateChanged(snapshot("b", &[], &["a"])));
    sdk.send(PlayerEvent::StateChanged(snapshot("b", &[], &["a"])));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn play_requests_are_dropped_without_a_device() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    // No ready event yet.
    controller
        .play_track("spotify:track:a")
        .await
        .expect("no-op play");

    let requests = server.received_requests().await.expect("recorded requests");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn play_tracks_starts_the_list_at_the_offset() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/me/player/play"))
        .and(query_param("device_id", "device-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    settle().await;

    controller
        .play_tracks(
            vec![
                "spotify:track:a".to_string(),
                "spotify:track:b".to_string(),
                "spotify:track:c".to_string(),
            ],
            1,
        )
        .await
        .expect("play tracks");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: Value = requests[0].body_json().expect("json body");
    assert_eq!(body["uris"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["offset"]["position"], 1);
}

#[tokio::test]
async fn credential_change_tears_down_and_reconnects() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::StateChanged(snapshot("a", &[], &[])));
    settle().await;

    controller.handle_credential_change().await;
    settle().await;

    assert!(sdk.calls().contains(&"disconnect".to_string()));
    assert_eq!(sdk.players_created.load(Ordering::SeqCst), 2);

    let state = controller.state().await;
    // The old record is gone; the new connection is still awaiting ready.
    assert!(state.current_track.is_none());
    assert!(state.device_id.is_none());
    assert_eq!(state.connection, ConnectionState::Connecting);
}

#[tokio::test]
async fn not_ready_clears_the_device_pairing() {
    let server = MockServer::start().await;
    let sdk = FakeSdk::new();
    let (controller, _) = controller_with(&server, sdk.clone()).await;

    controller.initialize().await;
    sdk.send(PlayerEvent::Ready {
        device_id: "device-1".to_string(),
    });
    sdk.send(PlayerEvent::StateChanged(snapshot("a", &[], &[])));
    settle().await;

    sdk.send(PlayerEvent::NotReady {
        device_id: "device-1".to_string(),
    });
    settle().await;

    let state = controller.state().await;
    assert_eq!(state.connection, ConnectionState::Uninitialized);
    assert!(state.device_id.is_none());

    // Transport is gone with the device.
    controller.toggle_play_pause().await;
    assert!(!sdk.calls().contains(&"toggle_play".to_string()));
}
