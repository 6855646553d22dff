pub mod error;
pub mod generator;
pub mod play;
