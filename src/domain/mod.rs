pub mod board;
pub mod track;
