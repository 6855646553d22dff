use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BingoError {
    #[error("board size must be 3, 4 or 5, got {0}")]
    InvalidSize(u8),

    #[error("board count must be between 1 and {max}, got {count}")]
    InvalidCount { count: usize, max: usize },

    #[error("not enough tracks: a board needs {required} but the playlist has {available}")]
    InsufficientTracks { required: usize, available: usize },

    #[error("cell ({row}, {col}) is outside of a {size}x{size} board")]
    OutOfRange { row: usize, col: usize, size: usize },

    #[error("malformed board: {0}")]
    MalformedBoard(String),
}
