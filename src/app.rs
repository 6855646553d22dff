//! Glue between the catalog, the board generator and the renderer. The HTTP
//! server and the CLI both go through [`BingoService`].

use std::{str::FromStr, time::Duration};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    bingo::{error::BingoError, generator::generate_multiple_boards},
    catalog::{TrackCatalog, error::CatalogError},
    domain::{
        board::{Board, BoardSize},
        track::Playlist,
    },
    export::{ExportKind, ExportPayload, package_today},
    render::{CancelToken, OutputKind, RenderJob, RenderStrategy, Renderer, error::RenderError},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Bingo(#[from] BingoError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Parameters shared by interactive generation and exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRequest {
    pub playlist_reference: String,
    pub board_count: usize,
    pub board_size: u8,
    #[serde(default)]
    pub include_free_space: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Zip,
    ImagesPdf,
    ImagesZip,
}

impl ExportFormat {
    pub fn from_parts(strategy: RenderStrategy, archive: bool) -> Self {
        match (strategy, archive) {
            (RenderStrategy::VectorTable, false) => ExportFormat::Pdf,
            (RenderStrategy::VectorTable, true) => ExportFormat::Zip,
            (RenderStrategy::RasterImage, false) => ExportFormat::ImagesPdf,
            (RenderStrategy::RasterImage, true) => ExportFormat::ImagesZip,
        }
    }

    pub fn strategy(self) -> RenderStrategy {
        match self {
            ExportFormat::Pdf | ExportFormat::Zip => RenderStrategy::VectorTable,
            ExportFormat::ImagesPdf | ExportFormat::ImagesZip => RenderStrategy::RasterImage,
        }
    }

    pub fn output(self) -> OutputKind {
        match self {
            ExportFormat::Pdf | ExportFormat::ImagesPdf => OutputKind::SingleDocument,
            ExportFormat::Zip | ExportFormat::ImagesZip => OutputKind::PerBoardArchive,
        }
    }

    pub fn kind(self) -> ExportKind {
        match self.output() {
            OutputKind::SingleDocument => ExportKind::Document,
            OutputKind::PerBoardArchive => ExportKind::Archive,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(ExportFormat::Pdf),
            "zip" => Ok(ExportFormat::Zip),
            "images-pdf" => Ok(ExportFormat::ImagesPdf),
            "images-zip" => Ok(ExportFormat::ImagesZip),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

pub struct BingoService {
    catalog: Box<dyn TrackCatalog>,
    renderer: Renderer,
    max_boards: usize,
    render_timeout: Option<Duration>,
}

impl BingoService {
    pub fn new(catalog: Box<dyn TrackCatalog>, renderer: Renderer, max_boards: usize) -> Self {
        Self {
            catalog,
            renderer,
            max_boards,
            render_timeout: None,
        }
    }

    /// Exports that take longer than `limit` are abandoned
    pub fn with_render_timeout(mut self, limit: Duration) -> Self {
        self.render_timeout = Some(limit);
        self
    }

    /// Token for one export, expiring after the render timeout if one is set
    pub fn cancel_token(&self) -> CancelToken {
        match self.render_timeout {
            Some(limit) => CancelToken::with_deadline(limit),
            None => CancelToken::new(),
        }
    }

    pub fn fetch_playlist(&self, reference: &str) -> Result<Playlist, CatalogError> {
        let playlist = self.catalog.fetch_playlist(reference)?;
        info!(
            "playlist '{}' ({}): {} tracks",
            playlist.name,
            playlist.id,
            playlist.tracks.len()
        );
        Ok(playlist)
    }

    /// Checks the request, then fetches the playlist and deals the boards
    pub fn generate_boards(&self, request: &BoardRequest) -> Result<Vec<Board>, ExportError> {
        if request.board_count == 0 || request.board_count > self.max_boards {
            return Err(BingoError::InvalidCount {
                count: request.board_count,
                max: self.max_boards,
            }
            .into());
        }
        let size = BoardSize::new(request.board_size)?;

        let playlist = self.fetch_playlist(&request.playlist_reference)?;

        Ok(generate_multiple_boards(
            &playlist.tracks,
            request.board_count,
            size,
            request.include_free_space,
        )?)
    }

    /// Generates fresh boards and renders them. Nothing is rendered unless every board could be built.
    pub fn export(
        &self,
        request: &BoardRequest,
        format: ExportFormat,
        cancel: CancelToken,
    ) -> Result<(ExportPayload, Vec<u8>), ExportError> {
        let boards = self.generate_boards(request)?;

        let bytes = self.renderer.render(RenderJob {
            boards,
            include_free_space: request.include_free_space,
            output: format.output(),
            strategy: format.strategy(),
            cancel,
        })?;

        let payload = package_today(&bytes, format.kind());
        info!("exported {} ({} bytes)", payload.filename, bytes.len());
        Ok((payload, bytes))
    }
}

#[cfg(test)]
pub(crate) fn test_service(track_count: usize) -> BingoService {
    use crate::{
        catalog::{StaticCatalog, mock_playlist},
        render::test_renderer,
    };

    BingoService::new(
        Box::new(StaticCatalog::new(mock_playlist(track_count))),
        test_renderer(),
        10,
    )
}
