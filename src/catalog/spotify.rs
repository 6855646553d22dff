use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use log::debug;
use reqwest::{
    StatusCode,
    blocking::{Client, Response},
    header::RETRY_AFTER,
};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    catalog::{TrackCatalog, error::CatalogError, reference::parse_playlist_reference},
    config::CatalogConfig,
    domain::track::{Playlist, Track, TrackId},
};

const PAGE_LIMIT: usize = 100;
/// Tokens are refreshed this long before the catalog says they expire
const TOKEN_MARGIN: Duration = Duration::from_secs(30);
const PREFERRED_ARTWORK_WIDTH: u32 = 300;

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Catalog client using the client-credentials flow
pub struct SpotifyCatalog {
    client: Client,
    config: CatalogConfig,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyCatalog {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    fn access_token(&self) -> Result<String, CatalogError> {
        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        debug!("requesting catalog access token");
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;

        if matches!(response.status().as_u16(), 400 | 401 | 403) {
            return Err(CatalogError::Auth);
        }
        let token: TokenResponse = decode(check_status(response, "token")?)?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    fn forget_token(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn get<T: DeserializeOwned>(&self, url: &str, playlist_id: &str) -> Result<T, CatalogError> {
        let token = self.access_token()?;
        let response = self.client.get(url).bearer_auth(token).send()?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.forget_token();
        }

        decode(check_status(response, playlist_id)?)
    }
}

impl TrackCatalog for SpotifyCatalog {
    fn fetch_playlist(&self, reference: &str) -> Result<Playlist, CatalogError> {
        let id = parse_playlist_reference(reference)?;

        let url = format!(
            "{}/playlists/{id}?limit={PAGE_LIMIT}",
            self.config.api_base.trim_end_matches('/')
        );
        let playlist: ApiPlaylist = self.get(&url, &id)?;

        let total = playlist.tracks.total;
        let tracks = collect_pages(playlist.tracks, |next| self.get(next, &id))?;
        debug!("playlist {id}: {} usable tracks of {total}", tracks.len());

        Ok(Playlist {
            id: playlist.id,
            name: playlist.name,
            description: playlist.description.unwrap_or_default(),
            owner_name: playlist
                .owner
                .and_then(|o| o.display_name)
                .unwrap_or_default(),
            total_track_count: total,
            canonical_link: playlist.external_urls.spotify.unwrap_or_default(),
            tracks,
        })
    }
}

fn check_status(response: Response, playlist_id: &str) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());

    Err(status_error(status.as_u16(), retry_after, playlist_id))
}

/// Maps a non-success status code to the catalog error it stands for
pub(crate) fn status_error(status: u16, retry_after: Option<u64>, playlist_id: &str) -> CatalogError {
    match status {
        404 => CatalogError::NotFound(playlist_id.to_string()),
        401 | 403 => CatalogError::Auth,
        429 => CatalogError::RateLimited { retry_after },
        status => CatalogError::Upstream { status },
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}

/// Walks `next` links from the first page until they run out
fn collect_pages<F>(first: Paging<PlaylistItem>, mut fetch_next: F) -> Result<Vec<Track>, CatalogError>
where
    F: FnMut(&str) -> Result<Paging<PlaylistItem>, CatalogError>,
{
    let mut tracks = Vec::with_capacity(first.total);
    let mut page = first;

    loop {
        tracks.extend(page.items.into_iter().filter_map(PlaylistItem::into_track));

        match page.next {
            Some(next) => {
                debug!("fetching next page: {next}");
                page = fetch_next(&next)?;
            }
            None => break,
        }
    }

    Ok(tracks)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    description: Option<String>,
    owner: Option<ApiOwner>,
    #[serde(default)]
    external_urls: ExternalUrls,
    tracks: Paging<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    #[serde(default)]
    duration_ms: u64,
    album: Option<ApiAlbum>,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    external_urls: ExternalUrls,
    #[serde(default)]
    is_local: bool,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
    width: Option<u32>,
}

impl PlaylistItem {
    /// Local files and removed tracks have no id and are skipped
    fn into_track(self) -> Option<Track> {
        let track = self.track?;
        if track.is_local {
            return None;
        }
        let id = track.id?;

        let all_artists: Vec<String> = track.artists.into_iter().map(|a| a.name).collect();
        let artwork_url = track
            .album
            .and_then(|album| pick_artwork(album.images));

        Some(Track {
            id: TrackId::new(id),
            name: track.name,
            primary_artist: all_artists.first().cloned().unwrap_or_default(),
            all_artists,
            duration_ms: track.duration_ms,
            artwork_url,
            uri: track.uri,
            external_link: track.external_urls.spotify.unwrap_or_default(),
        })
    }
}

/// Smallest image still wide enough for a cell thumbnail, else the first one
fn pick_artwork(images: Vec<ApiImage>) -> Option<String> {
    let wide_enough = images
        .iter()
        .filter(|i| i.width.is_some_and(|w| w >= PREFERRED_ARTWORK_WIDTH))
        .min_by_key(|i| i.width)
        .map(|i| i.url.clone());

    wide_enough.or_else(|| images.into_iter().next().map(|i| i.url))
}
