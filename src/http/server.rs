use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::{
    app::{BingoService, BoardRequest, ExportFormat},
    bingo::play::BoardStatus,
    config::HttpConfig,
    domain::{board::Board, track::Playlist},
    http::error::ApiError,
};

pub struct HttpServer {
    service: Arc<BingoService>,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(service: BingoService, config: HttpConfig) -> Self {
        Self {
            service: Arc::new(service),
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (POST) (/api/playlist) => {
                self.handle_playlist(request)
            },
            (POST) (/api/boards) => {
                self.handle_generate_boards(request)
            },
            (POST) (/api/boards/toggle) => {
                Self::handle_toggle(request)
            },
            (POST) (/api/boards/reset) => {
                Self::handle_reset(request)
            },
            (POST) (/api/export/{format: String}) => {
                self.handle_export(request, &format, false)
            },
            (POST) (/api/export/{format: String}/download) => {
                self.handle_export(request, &format, true)
            },
            _ => Ok(Response::empty_404())
        );

        let response = result.unwrap_or_else(ApiError::into_response);
        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn handle_playlist(&self, request: &Request) -> Result<Response, ApiError> {
        let body: PlaylistRequest = read_json(request)?;
        let playlist = self.service.fetch_playlist(&body.playlist_reference)?;
        Ok(Response::json(&PlaylistResponse::from_domain(playlist)))
    }

    fn handle_generate_boards(&self, request: &Request) -> Result<Response, ApiError> {
        let body: BoardRequest = read_json(request)?;
        let boards = self.service.generate_boards(&body)?;
        Ok(Response::json(&BoardsResponse { boards }))
    }

    fn handle_toggle(request: &Request) -> Result<Response, ApiError> {
        let body: ToggleRequest = read_json(request)?;
        let mut board = body.board;
        board.validate()?;

        board.toggle_cell(body.row, body.col)?;
        Ok(Response::json(&BoardStateResponse::new(board)))
    }

    fn handle_reset(request: &Request) -> Result<Response, ApiError> {
        let body: ResetRequest = read_json(request)?;
        let mut board = body.board;
        board.validate()?;

        board.reset();
        Ok(Response::json(&BoardStateResponse::new(board)))
    }

    /// `download` answers with the raw file instead of the base64 payload
    fn handle_export(
        &self,
        request: &Request,
        format: &str,
        download: bool,
    ) -> Result<Response, ApiError> {
        let format: ExportFormat = format.parse().map_err(ApiError::NotFound)?;
        let body: BoardRequest = read_json(request)?;

        let (payload, bytes) = self.service.export(&body, format, self.service.cancel_token())?;

        if !download {
            return Ok(Response::json(&payload));
        }

        let mime = mime_guess::from_path(&payload.filename)
            .first_or_octet_stream()
            .to_string();
        log::debug!("DOWNLOAD {} -> {} bytes, MIME type: {}", payload.filename, bytes.len(), mime);

        Ok(Response::from_data(mime, bytes).with_additional_header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", payload.filename),
        ))
    }
}

fn read_json<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    rouille::input::json_input(request)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistRequest {
    playlist_reference: String,
}

#[derive(Serialize, Deserialize)]
struct ToggleRequest {
    board: Board,
    row: usize,
    col: usize,
}

#[derive(Serialize, Deserialize)]
struct ResetRequest {
    board: Board,
}

#[derive(Serialize, Deserialize)]
struct BoardsResponse {
    boards: Vec<Board>,
}

#[derive(Serialize, Deserialize)]
struct BoardStateResponse {
    board: Board,
    status: BoardStatus,
}

impl BoardStateResponse {
    fn new(board: Board) -> Self {
        Self {
            status: board.status(),
            board,
        }
    }
}

/// Playlist as shown to the front end before boards are generated
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResponse {
    #[serde(flatten)]
    playlist: Playlist,
    usable_track_count: usize,
}

impl PlaylistResponse {
    fn from_domain(playlist: Playlist) -> Self {
        Self {
            usable_track_count: playlist.tracks.len(),
            playlist,
        }
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
