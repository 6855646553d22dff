use crate::{catalog::error::CatalogError, domain::track::Playlist};

pub mod error;
pub mod reference;
pub mod spotify;

/// Source of playlists and their tracks
pub trait TrackCatalog: Send + Sync {
    fn fetch_playlist(&self, reference: &str) -> Result<Playlist, CatalogError>;
}

/// Serves one fixed playlist for any non-empty reference. Used for offline exports.
pub struct StaticCatalog {
    playlist: Playlist,
}

impl StaticCatalog {
    pub fn new(playlist: Playlist) -> Self {
        Self { playlist }
    }
}

impl TrackCatalog for StaticCatalog {
    fn fetch_playlist(&self, reference: &str) -> Result<Playlist, CatalogError> {
        if reference.trim().is_empty() {
            return Err(CatalogError::InvalidReference(reference.to_string()));
        }
        Ok(self.playlist.clone())
    }
}

#[cfg(test)]
pub(crate) fn mock_playlist(track_count: usize) -> Playlist {
    use crate::domain::track::mock_pool;

    Playlist {
        id: "37i9dQZF1DXcBWIGoYBM5M".to_string(),
        name: "Test mix".to_string(),
        description: String::new(),
        owner_name: "tester".to_string(),
        total_track_count: track_count,
        canonical_link: "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M".to_string(),
        tracks: mock_pool(track_count),
    }
}
