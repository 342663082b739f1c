//! Serde data model for the Spotify Web API responses the client consumes

use serde::{Deserialize, Serialize};

/// One page of a cursor-paginated collection.
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u32,
    pub limit: u32,
    pub offset: u32,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub release_date: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub duration_ms: u32,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub popularity: u32,
    pub album: Album,
    pub artists: Vec<Artist>,
}

/// An entry in the user's saved-tracks library.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SavedTrack {
    pub added_at: String,
    pub track: Track,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: Page<Track>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub country: Option<String>,
}

/// Body of a start/resume playback request.
#[derive(Clone, Debug, Serialize)]
pub struct PlayRequest {
    pub uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayOffset {
    pub position: usize,
}
