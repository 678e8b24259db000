use crate::api::MediaServer;
use crate::config::Config;
use crate::index::build_track_index;
use crate::models::PlaylistOutcome;
use crate::playlist::{load_playlists, select_playlists, LoaderOptions};
use crate::reconcile::{ReconcileOptions, Reconciler};
use crate::report;
use anyhow::{Context, Result};

/// Per-invocation switches layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Only these playlists (exact names); empty means all.
    pub playlists: Vec<String>,
    /// Overrides `Config::section`.
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<PlaylistOutcome>,
    /// Requested playlist names with no matching local file.
    pub missing: Vec<String>,
}

impl RunReport {
    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(report::playlist_line).collect()
    }

    pub fn summary(&self) -> String {
        report::summary_line(&self.outcomes)
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// One full run: load the local playlists, index the section once, then
/// reconcile each playlist in order. Only loader and catalog failures abort;
/// everything else is reported per playlist.
pub async fn run_sync(cfg: &Config, server: &dyn MediaServer, opts: &RunOptions) -> Result<RunReport> {
    let section = opts.section.as_deref().unwrap_or(&cfg.section);

    let whitelist = if cfg.playlist_whitelist.is_empty() {
        None
    } else {
        Some(
            regex::Regex::new(&cfg.playlist_whitelist)
                .with_context(|| format!("invalid playlist_whitelist '{}'", cfg.playlist_whitelist))?,
        )
    };

    let all = load_playlists(&cfg.playlist_source_path, &LoaderOptions::from_config(cfg))?;
    let (playlists, missing) = select_playlists(all, &opts.playlists, whitelist.as_ref());
    for name in &missing {
        log::warn!("Requested playlist '{}' not found in {}", name, cfg.playlist_source_path.display());
    }
    log::info!("{} playlists to sync", playlists.len());

    if cfg.refresh_library {
        if let Err(e) = server.refresh_section(section).await {
            log::warn!("Library refresh for section '{}' failed: {:#}", section, e);
        }
    }

    let index = build_track_index(server, section).await?;

    let reconciler = Reconciler::new(server, &index, ReconcileOptions::from_config(cfg, opts.dry_run));
    let mut outcomes = Vec::with_capacity(playlists.len());
    for playlist in &playlists {
        outcomes.push(reconciler.reconcile(playlist).await);
    }

    Ok(RunReport { outcomes, missing })
}

