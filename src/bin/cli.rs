use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;
use tracing_log::LogTracer;
use tracing::subscriber as tracing_subscriber_global;
use anyhow::{Result, Context};
use plex_playlist_sync as lib;
use lib::api::plex::PlexServer;
use lib::config::Config;
use lib::sync::RunOptions;

#[derive(Parser)]
#[command(name = "plex-playlist-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overwrite server playlists with the local definitions
    Sync {
        /// Compute and report changes without touching the server
        #[arg(long, short = 'n')]
        dry_run: bool,

        /// Only sync this playlist (repeatable); default is every playlist
        #[arg(long = "playlist", short = 'p', value_name = "NAME")]
        playlists: Vec<String>,

        /// Library section to index instead of the configured one
        #[arg(long)]
        section: Option<String>,
    },
    /// List local playlists and their entry counts
    List,
    /// Validate config file and exit
    ConfigValidate,
}

/// Logs go to stderr (stdout carries the report) and, when `log_dir` is
/// set, to a daily-rotated file.
fn init_logging(cfg: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let _ = LogTracer::init();

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "plex-playlist-sync.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(fmt::layer().with_ansi(false).with_writer(non_blocking)), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Install as global default without the subscriber's own log bridge
    // (LogTracer is already installed above).
    if let Err(e) = tracing_subscriber_global::set_global_default(subscriber) {
        eprintln!("failed to set global tracing subscriber: {}", e);
    }
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = lib::config::resolve_config_path(cli.config.as_deref());

    let cfg = Config::from_path(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if let Commands::ConfigValidate = cli.command {
        match cfg.validate() {
            Ok(()) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    cfg.validate()
        .with_context(|| format!("validating config {}", config_path.display()))?;
    let _guard = init_logging(&cfg);

    match cli.command {
        Commands::Sync { dry_run, playlists, section } => {
            if dry_run {
                println!("Dry run: no changes will be made.");
            }
            let server = PlexServer::new(&cfg.server_address, &cfg.token, cfg.page_size)?;
            let opts = RunOptions { dry_run, playlists, section };

            let report = lib::sync::run_sync(&cfg, &server, &opts)
                .await
                .context("sync aborted")?;

            if !report.missing.is_empty() {
                println!("Playlist(s) not found: {}", report.missing.join(", "));
            }
            for line in report.lines() {
                println!("{}", line);
            }
            println!("{}", report.summary());

            if report.failed() > 0 {
                std::process::exit(2);
            }
        }
        Commands::List => {
            let opts = lib::playlist::LoaderOptions::from_config(&cfg);
            let playlists = lib::playlist::load_playlists(&cfg.playlist_source_path, &opts)?;
            println!("Playlists found in {}:", cfg.playlist_source_path.display());
            let mut total = 0usize;
            for pl in &playlists {
                total += pl.entries.len();
                println!("  {:<38} {:10} entries", format!("'{}'", pl.name), pl.entries.len());
            }
            println!("Total: {} playlists, {} entries", playlists.len(), total);
        }
        // handled before logging setup
        Commands::ConfigValidate => {}
    }

    Ok(())
}
