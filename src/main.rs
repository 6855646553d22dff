use crate::cli::run;

mod app;
pub mod bingo;
pub mod catalog;
pub mod cli;
mod config;
pub mod domain;
mod export;
pub mod http;
pub mod render;

fn main() {
    run();
}
