use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not a playlist link or id: '{0}'")]
    InvalidReference(String),

    #[error("playlist {0} not found")]
    NotFound(String),

    #[error("catalog rejected the credentials")]
    Auth,

    #[error("catalog rate limit hit, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("catalog returned status {status}")]
    Upstream { status: u16 },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("cannot decode catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}
