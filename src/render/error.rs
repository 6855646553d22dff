use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render: no boards given")]
    NoBoards,

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("svg error: {0}")]
    Svg(#[from] resvg::usvg::Error),

    #[error("canvas error: {0}")]
    Canvas(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("font error: {0}")]
    Font(String),

    #[error("artwork {url} unavailable: {reason}")]
    Artwork { url: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render cancelled")]
    Cancelled,
}

impl RenderError {
    /// printpdf errors only implement `Debug` reliably
    pub(crate) fn pdf(err: impl std::fmt::Debug) -> Self {
        RenderError::Pdf(format!("{err:?}"))
    }
}
