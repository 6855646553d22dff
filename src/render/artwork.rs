//! Album artwork used as cell thumbnails on rasterized boards

use std::{collections::HashMap, io::Cursor, time::Duration};

use base64::{Engine as _, engine::general_purpose};
use image::{ImageOutputFormat, imageops::FilterType};

use crate::render::{CancelToken, error::RenderError};

/// Longest side of a thumbnail embedded in a board
const THUMBNAIL_PX: u32 = 300;

pub trait ArtworkSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderError>;
}

/// Downloads artwork over HTTP, one bounded request per image
pub struct HttpArtwork {
    client: reqwest::blocking::Client,
}

impl HttpArtwork {
    pub fn new(timeout: Duration) -> Result<Self, RenderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Artwork {
                url: String::new(),
                reason: format!("cannot build http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl ArtworkSource for HttpArtwork {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        let artwork_err = |reason: String| RenderError::Artwork {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| artwork_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(artwork_err(format!("status {}", response.status())));
        }

        let bytes = response.bytes().map_err(|e| artwork_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Used when artwork is turned off: every cell is text-only
pub struct NoArtwork;

impl ArtworkSource for NoArtwork {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Artwork {
            url: url.to_string(),
            reason: "artwork disabled".to_string(),
        })
    }
}

/// Per-job artwork cache. Failures are remembered and degrade to `None`.
pub struct ArtworkLoader<'a> {
    source: &'a dyn ArtworkSource,
    cancel: &'a CancelToken,
    cache: HashMap<String, Option<String>>,
}

impl<'a> ArtworkLoader<'a> {
    pub fn new(source: &'a dyn ArtworkSource, cancel: &'a CancelToken) -> Self {
        Self {
            source,
            cancel,
            cache: HashMap::new(),
        }
    }

    /// PNG thumbnail as a `data:` URI, or `None` when the image can't be used.
    /// Only cancellation is reported as an error.
    pub fn data_uri(&mut self, url: &str) -> Result<Option<String>, RenderError> {
        if let Some(cached) = self.cache.get(url) {
            return Ok(cached.clone());
        }
        self.cancel.check()?;

        let uri = match self.source.fetch(url).and_then(|bytes| thumbnail_png(&bytes)) {
            Ok(png) => Some(format!(
                "data:image/png;base64,{}",
                general_purpose::STANDARD.encode(png)
            )),
            Err(e) => {
                log::warn!("skipping artwork {url}: {e}");
                None
            }
        };

        self.cache.insert(url.to_string(), uri.clone());
        Ok(uri)
    }
}

/// Decodes any supported image and re-encodes it as a small PNG
pub fn thumbnail_png(bytes: &[u8]) -> Result<Vec<u8>, RenderError> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > THUMBNAIL_PX || img.height() > THUMBNAIL_PX {
        img.resize(THUMBNAIL_PX, THUMBNAIL_PX, FilterType::Triangle)
    } else {
        img
    };

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}
