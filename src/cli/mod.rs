use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::app::{BingoService, BoardRequest, ExportFormat};
use crate::catalog::{StaticCatalog, TrackCatalog, spotify::SpotifyCatalog};
use crate::config::{self, RenderConfig};
use crate::domain::track::{Playlist, Track};
use crate::export::ExportPayload;
use crate::render::{RenderStrategy, Renderer};

#[derive(Parser)]
#[command(name = "bingodeck")]
#[command(version = "0.1")]
#[command(about = "Printable music bingo boards from a playlist")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server for the bingo front end
    Serve,
    /// Show a playlist and its tracks
    Playlist {
        /// Share link, spotify:playlist: uri or bare playlist id
        reference: String,
    },
    /// Generate boards and write the rendered file
    Export {
        reference: String,
        /// Read tracks from a JSON array instead of the catalog
        #[arg(long)]
        tracks: Option<PathBuf>,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Board side: 3, 4 or 5
        #[arg(short, long, default_value_t = 5)]
        size: u8,
        /// Put a free space in the centre of 5x5 boards
        #[arg(long)]
        free_space: bool,
        /// table or image
        #[arg(long, default_value = "table")]
        strategy: RenderStrategy,
        /// One file per board in a zip instead of one document
        #[arg(long)]
        archive: bool,
        /// Output path, defaults to the dated file name in the current directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Entrypoint for CLI
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve => {
            let cfg = config::Config::load(&cli.config)?;
            println!("Starting HTTP server...");

            let catalog = SpotifyCatalog::new(cfg.catalog)?;
            let renderer = Renderer::from_config(&cfg.render)?;
            let service = BingoService::new(Box::new(catalog), renderer, cfg.render.max_boards)
                .with_render_timeout(cfg.render.render_timeout());

            let http_server = crate::http::server::HttpServer::new(service, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
            Ok(())
        }

        Commands::Playlist { reference } => {
            let cfg = config::Config::load(&cli.config)?;
            let catalog = SpotifyCatalog::new(cfg.catalog)?;
            let playlist = catalog.fetch_playlist(&reference)?;

            print_playlist(&playlist);
            Ok(())
        }

        Commands::Export {
            reference,
            tracks,
            count,
            size,
            free_space,
            strategy,
            archive,
            out,
        } => {
            let (catalog, render_cfg): (Box<dyn TrackCatalog>, RenderConfig) = match tracks {
                Some(path) => {
                    let render_cfg = if cli.config.exists() {
                        config::Config::load(&cli.config)?.render
                    } else {
                        RenderConfig::default()
                    };
                    let playlist = offline_playlist(&path)?;
                    (Box::new(StaticCatalog::new(playlist)) as Box<dyn TrackCatalog>, render_cfg)
                }
                None => {
                    let cfg = config::Config::load(&cli.config)?;
                    (Box::new(SpotifyCatalog::new(cfg.catalog)?) as Box<dyn TrackCatalog>, cfg.render)
                }
            };

            let renderer = Renderer::from_config(&render_cfg)?;
            let service = BingoService::new(catalog, renderer, render_cfg.max_boards)
                .with_render_timeout(render_cfg.render_timeout());

            let request = BoardRequest {
                playlist_reference: reference,
                board_count: count,
                board_size: size,
                include_free_space: free_space,
            };
            let format = ExportFormat::from_parts(strategy, archive);
            let (payload, bytes) = service.export(&request, format, service.cancel_token())?;

            let path = write_export(&payload, &bytes, out.as_deref())?;
            println!("Wrote {} boards to {}", count, path.to_string_lossy());
            Ok(())
        }
    }
}

fn print_playlist(playlist: &Playlist) {
    println!("{} by {}", playlist.name, playlist.owner_name);
    if !playlist.canonical_link.is_empty() {
        println!("  {}", playlist.canonical_link);
    }
    println!(
        "{} of {} tracks usable for boards:",
        playlist.tracks.len(),
        playlist.total_track_count
    );
    for (i, track) in playlist.tracks.iter().enumerate() {
        println!(
            "  {:>3}. {} - {} ({})",
            i + 1,
            track.name,
            track.primary_artist,
            track.duration_label()
        );
    }
}

/// Builds a playlist out of a JSON array of tracks
fn offline_playlist(path: &Path) -> anyhow::Result<Playlist> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tracks file {}", path.display()))?;
    let tracks: Vec<Track> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tracks file {}", path.display()))?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Playlist {
        id: name.clone(),
        name,
        description: String::new(),
        owner_name: String::new(),
        total_track_count: tracks.len(),
        canonical_link: String::new(),
        tracks,
    })
}

fn write_export(payload: &ExportPayload, bytes: &[u8], out: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = match out {
        Some(dir) if dir.is_dir() => dir.join(&payload.filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(&payload.filename),
    };

    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
