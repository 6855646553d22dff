use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Catalog identifier of a track, as returned by the catalog API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represent a music track fetched from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub primary_artist: String,
    #[serde(default)]
    pub all_artists: Vec<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub external_link: String,
}

impl Track {
    /// Text printed in a board cell
    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// `m:ss` duration label
    pub fn duration_label(&self) -> String {
        let total_secs = self.duration_ms / 1000;
        format!("{}:{:02}", total_secs / 60, total_secs % 60)
    }
}

/// Playlist metadata together with all of its tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner_name: String,
    pub total_track_count: usize,
    #[serde(default)]
    pub canonical_link: String,
    pub tracks: Vec<Track>,
}

#[cfg(test)]
pub(crate) fn mock_track(x: usize) -> Track {
    Track {
        id: TrackId::new(format!("track{x:03}")),
        name: format!("Song number {x}"),
        primary_artist: format!("Artist {}", x % 7),
        all_artists: vec![format!("Artist {}", x % 7)],
        duration_ms: 180_000 + x as u64 * 1000,
        artwork_url: None,
        uri: format!("spotify:track:track{x:03}"),
        external_link: format!("https://open.spotify.com/track/track{x:03}"),
    }
}

#[cfg(test)]
pub(crate) fn mock_pool(n: usize) -> Vec<Track> {
    (0..n).map(mock_track).collect()
}
