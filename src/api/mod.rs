//! Spotify Web API client with resilient request execution
//!
//! Thin JSON wrapper over the [`RequestExecutor`]: it builds request URLs,
//! injects the bearer credential and JSON content type, maps non-2xx
//! responses to [`ApiError`] and special-cases empty bodies. All retry and
//! session-refresh behavior lives in the executor.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};
use crate::executor::{RequestExecutor, RetryOptions};
use crate::session::SessionProvider;
use types::{Page, PlayOffset, PlayRequest, SavedTrack, SearchResponse, Track, UserProfile};

const SPOTIFY_BASE_URL: &str = "https://api.spotify.com/v1";

/// Maximum page size the saved-tracks endpoint accepts.
pub const LIKED_TRACKS_PAGE_SIZE: u32 = 50;

/// Default number of results for a text search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Client for the Spotify Web API endpoints used by the player.
#[derive(Clone)]
pub struct SpotifyApi {
    http: Client,
    base_url: String,
    executor: RequestExecutor,
    retry: Arc<RetryOptions>,
}

impl SpotifyApi {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Result<Self> {
        Self::with_base_url(sessions, SPOTIFY_BASE_URL)
    }

    /// Point the client at a different base URL. Used by tests.
    pub fn with_base_url(
        sessions: Arc<dyn SessionProvider>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("spotify-web-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            executor: RequestExecutor::new(sessions),
            retry: Arc::new(RetryOptions::default()),
        })
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = Arc::new(retry);
        self
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Perform one resilient JSON request.
    ///
    /// Returns `Ok(None)` for empty responses: 204, a zero content length,
    /// or a non-JSON content type.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(method = %method, endpoint, "API request");

        let http = self.http.clone();
        let operation = move |session: crate::session::SessionToken| {
            let http = http.clone();
            let method = method.clone();
            let url = url.clone();
            let query = query.clone();
            let body = body.clone();
            async move {
                let mut request = http
                    .request(method, &url)
                    .bearer_auth(&session.access_token)
                    .header(CONTENT_TYPE, "application/json")
                    .query(&query);
                if let Some(body) = &body {
                    request = request.json(body);
                }

                let response = request.send().await?;
                let status = response.status();

                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(ApiError::Status {
                        status: status.as_u16(),
                        message,
                    });
                }

                if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
                    return Ok(None);
                }
                let is_json = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .is_some_and(|value| value.contains("application/json"));
                if !is_json {
                    return Ok(None);
                }

                let parsed = response
                    .json::<T>()
                    .await
                    .map_err(|e| ApiError::Parse(e.to_string()))?;
                Ok(Some(parsed))
            }
        };

        self.executor.execute(operation, &self.retry).await
    }

    /// Like [`Self::request_json`] but for endpoints expected to return a body.
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: Vec<(String, String)>,
    ) -> Result<T> {
        self.request_json(method, endpoint, query, None)
            .await?
            .ok_or_else(|| ApiError::Parse(format!("empty response from {endpoint}")))
    }

    pub async fn get_user_profile(&self) -> Result<UserProfile> {
        self.fetch_json(Method::GET, "/me", Vec::new()).await
    }

    /// Text search for tracks on the service.
    pub async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
        let response: SearchResponse = self
            .fetch_json(
                Method::GET,
                "/search",
                vec![
                    ("q".into(), query.to_string()),
                    ("type".into(), "track".into()),
                    ("limit".into(), limit.to_string()),
                ],
            )
            .await?;
        Ok(response.tracks.items)
    }

    /// One page of the user's saved tracks.
    pub async fn get_liked_tracks(&self, offset: u32, limit: u32) -> Result<Page<SavedTrack>> {
        self.fetch_json(
            Method::GET,
            "/me/tracks",
            vec![
                ("offset".into(), offset.to_string()),
                ("limit".into(), limit.to_string()),
            ],
        )
        .await
    }

    /// The entire saved-tracks library, assembled page by page.
    ///
    /// Pages until a page comes back short or the `next` cursor is null.
    pub async fn get_all_liked_tracks(&self) -> Result<Vec<SavedTrack>> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .get_liked_tracks(offset, LIKED_TRACKS_PAGE_SIZE)
                .await?;
            let fetched = page.items.len() as u32;
            let exhausted = fetched < LIKED_TRACKS_PAGE_SIZE || page.next.is_none();
            all.extend(page.items);
            if exhausted {
                break;
            }
            offset += LIKED_TRACKS_PAGE_SIZE;
        }

        tracing::info!(count = all.len(), "Loaded full liked-tracks library");
        Ok(all)
    }

    /// Add a track to the saved library. Idempotent PUT.
    pub async fn save_liked_track(&self, track_id: &str) -> Result<()> {
        tracing::debug!(track_id, "Adding track to liked songs");
        self.request_json::<serde_json::Value>(
            Method::PUT,
            "/me/tracks",
            vec![("ids".into(), track_id.to_string())],
            None,
        )
        .await?;
        Ok(())
    }

    /// Remove a track from the saved library. Idempotent DELETE.
    pub async fn remove_liked_track(&self, track_id: &str) -> Result<()> {
        tracing::debug!(track_id, "Removing track from liked songs");
        self.request_json::<serde_json::Value>(
            Method::DELETE,
            "/me/tracks",
            vec![("ids".into(), track_id.to_string())],
            None,
        )
        .await?;
        Ok(())
    }

    /// For each id, whether the track is in the saved library.
    pub async fn check_liked_tracks(&self, track_ids: &[String]) -> Result<Vec<bool>> {
        self.fetch_json(
            Method::GET,
            "/me/tracks/contains",
            vec![("ids".into(), track_ids.join(","))],
        )
        .await
    }

    /// Start playback of `uris` on the given device, optionally at an offset
    /// into the list.
    pub async fn start_playback(
        &self,
        device_id: &str,
        uris: Vec<String>,
        start_index: Option<usize>,
    ) -> Result<()> {
        tracing::debug!(device_id, count = uris.len(), ?start_index, "API: start_playback");
        let body = PlayRequest {
            uris,
            offset: start_index.map(|position| PlayOffset { position }),
        };
        self.request_json::<serde_json::Value>(
            Method::PUT,
            "/me/player/play",
            vec![("device_id".into(), device_id.to_string())],
            Some(serde_json::to_value(&body).map_err(|e| ApiError::Parse(e.to_string()))?),
        )
        .await?;
        Ok(())
    }
}

/// Case-insensitive substring search over the already-fetched library.
///
/// Matches the track name, any artist name, or the album name. A blank
/// query matches nothing.
pub fn search_user_library(query: &str, liked_tracks: &[SavedTrack]) -> Vec<Track> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }

    liked_tracks
        .iter()
        .filter(|saved| {
            let track = &saved.track;
            track.name.to_lowercase().contains(&term)
                || track
                    .artists
                    .iter()
                    .any(|artist| artist.name.to_lowercase().contains(&term))
                || track.album.name.to_lowercase().contains(&term)
        })
        .map(|saved| saved.track.clone())
        .collect()
}
