use rouille::Response;
use serde::Serialize;

use crate::{
    app::ExportError, bingo::error::BingoError, catalog::error::CatalogError,
    render::error::RenderError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    TooManyRequests { message: String, retry_after: Option<u64> },
    BadGateway(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl From<BingoError> for ApiError {
    fn from(err: BingoError) -> Self {
        // every generation and play error is caused by the request
        ApiError::BadRequest(err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidReference(_) => ApiError::BadRequest(err.to_string()),

            CatalogError::NotFound(_) => ApiError::NotFound(err.to_string()),

            CatalogError::Auth => ApiError::Unauthorized(err.to_string()),

            CatalogError::RateLimited { retry_after } => ApiError::TooManyRequests {
                message: err.to_string(),
                retry_after,
            },

            CatalogError::Upstream { .. } => {
                log::error!("catalog failure: {err}");
                ApiError::BadGateway(err.to_string())
            }

            CatalogError::Http(_) | CatalogError::Decode(_) => {
                log::error!("catalog failure: {err}");
                ApiError::BadGateway("music catalog is unavailable".into())
            }
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NoBoards => ApiError::BadRequest(err.to_string()),
            err => {
                log::error!("render failure: {err}");
                ApiError::Internal("failed to render boards".into())
            }
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Bingo(e) => e.into(),
            ExportError::Catalog(e) => e.into(),
            ExportError::Render(e) => e.into(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::TooManyRequests { .. } => 429,
            ApiError::BadGateway(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::TooManyRequests { message: msg, .. }
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    pub fn into_response(self) -> Response {
        let response = Response::json(&ErrorBody {
            error: self.message(),
        })
        .with_status_code(self.status_code());

        match self {
            ApiError::TooManyRequests {
                retry_after: Some(secs),
                ..
            } => response.with_additional_header("Retry-After", secs.to_string()),
            _ => response,
        }
    }
}
