use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::RenderConfig,
    domain::board::Board,
    render::{
        artwork::{ArtworkSource, HttpArtwork, NoArtwork},
        error::RenderError,
        font::{FontResource, FontSettings},
        raster::RasterRenderer,
        table::TableRenderer,
    },
};

pub mod archive;
pub mod artwork;
pub mod error;
pub mod fit;
pub mod font;
pub mod raster;
pub mod table;

/// How boards are turned into pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderStrategy {
    /// text table in a vector pdf, one page per board
    VectorTable,
    /// one PNG per board, optionally two per pdf page
    RasterImage,
}

impl FromStr for RenderStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" | "vector" => Ok(RenderStrategy::VectorTable),
            "image" | "raster" => Ok(RenderStrategy::RasterImage),
            other => Err(format!("unknown render strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    SingleDocument,
    PerBoardArchive,
}

/// Set by the caller, or expired by its deadline, to abandon a render in progress
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels itself once `limit` has passed
    pub fn with_deadline(limit: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(Instant::now() + limit),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), RenderError> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Operations every render strategy provides
pub trait BoardRenderer {
    /// One file holding every board
    fn render_single_document(
        &self,
        boards: &[Board],
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError>;

    /// A zip with one `board_NNN` file per board
    fn render_per_board_archive(
        &self,
        boards: &[Board],
        include_free_space: bool,
    ) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug)]
pub struct RenderJob {
    pub boards: Vec<Board>,
    pub include_free_space: bool,
    pub output: OutputKind,
    pub strategy: RenderStrategy,
    pub cancel: CancelToken,
}

/// Owns the loaded fonts and the artwork source; build it once and reuse it
pub struct Renderer {
    fonts: FontResource,
    artwork: Box<dyn ArtworkSource>,
    dpi: f32,
}

impl Renderer {
    pub fn new(fonts: FontResource, artwork: Box<dyn ArtworkSource>, dpi: f32) -> Self {
        Self {
            fonts,
            artwork,
            dpi,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        let fonts = FontResource::load(&FontSettings {
            font_path: config.font_path.clone(),
            bold_font_path: config.bold_font_path.clone(),
            system_fonts: true,
        })?;

        let artwork: Box<dyn ArtworkSource> = if config.fetch_artwork {
            Box::new(HttpArtwork::new(Duration::from_millis(
                config.artwork_timeout_ms,
            ))?)
        } else {
            Box::new(NoArtwork)
        };

        Ok(Self::new(fonts, artwork, config.dpi))
    }

    /// Renders the whole job, or nothing at all
    pub fn render(&self, job: RenderJob) -> Result<Vec<u8>, RenderError> {
        log::info!(
            "rendering {} boards as {:?} / {:?}",
            job.boards.len(),
            job.strategy,
            job.output
        );
        self.fonts.warn_missing_glyphs(
            job.boards
                .iter()
                .flat_map(|board| board.tracks())
                .map(|track| track.display_name()),
        );

        let table;
        let raster;
        let strategy: &dyn BoardRenderer = match job.strategy {
            RenderStrategy::VectorTable => {
                table = TableRenderer::new(&self.fonts, &job.cancel);
                &table
            }
            RenderStrategy::RasterImage => {
                raster = RasterRenderer::new(&self.fonts, self.artwork.as_ref(), &job.cancel, self.dpi);
                &raster
            }
        };

        let bytes = match job.output {
            OutputKind::SingleDocument => {
                strategy.render_single_document(&job.boards, job.include_free_space)
            }
            OutputKind::PerBoardArchive => {
                strategy.render_per_board_archive(&job.boards, job.include_free_space)
            }
        }?;

        log::debug!("rendered {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
pub(crate) fn test_renderer() -> Renderer {
    Renderer::new(FontResource::empty(), Box::new(NoArtwork), 30.0)
}
