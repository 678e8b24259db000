use crate::error::SyncError;
use crate::models::DesiredPlaylist;
use anyhow::Context;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How exported playlist files are found and how their entries map onto the
/// server's paths.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Patterns like "m3u", ".m3u" or "*.m3u"; case-insensitive.
    pub extensions: Vec<String>,
    /// Prepended to every converted entry.
    pub path_prefix: String,
}

impl LoaderOptions {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            extensions: cfg.playlist_extensions.clone(),
            path_prefix: cfg.path_prefix.clone(),
        }
    }
}

/// Return true if the given path's extension matches any of the configured
/// patterns ("*.m3u", "m3u", ".m3u"), case-insensitive.
fn path_matches_extensions(path: &Path, exts: &[String]) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(s) => s.to_ascii_lowercase(),
        None => return false,
    };
    exts.iter().any(|pat| {
        let p = pat.trim();
        let p = p
            .strip_prefix("*.")
            .or_else(|| p.strip_prefix('.'))
            .unwrap_or(p);
        !p.is_empty() && ext == p.to_ascii_lowercase()
    })
}

/// Turn one playlist line into the path the server reports for that file.
///
/// Exported playlists hold DOS-style paths relative to the playlist
/// directory (`..\Music\a.mp3`); the server knows the same file under
/// `path_prefix` with forward slashes.
pub fn convert_entry(line: &str, path_prefix: &str) -> String {
    let mut rel = line.trim_end().replace('\\', "/");
    loop {
        if let Some(rest) = rel.strip_prefix("../") {
            rel = rest.to_string();
        } else if let Some(rest) = rel.strip_prefix("./") {
            rel = rest.to_string();
        } else {
            break;
        }
    }
    format!("{}{}", path_prefix, rel)
}

/// Parse playlist text: comment (`#`) and blank lines are skipped, every
/// other line is one entry, kept in order and with duplicates.
pub fn parse_playlist(text: &str, path_prefix: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim_start_matches('\u{feff}'))
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .map(|l| convert_entry(l, path_prefix))
        .collect()
}

pub fn read_playlist_file(path: &Path, opts: &LoaderOptions) -> anyhow::Result<DesiredPlaylist> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("playlist file name is not valid UTF-8: {:?}", path))?
        .to_string();
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(DesiredPlaylist {
        name,
        entries: parse_playlist(&text, &opts.path_prefix),
    })
}

/// Load every playlist file directly inside `dir`, ordered by file name.
pub fn load_playlists(dir: &Path, opts: &LoaderOptions) -> Result<Vec<DesiredPlaylist>, SyncError> {
    load_playlists_inner(dir, opts).map_err(|source| SyncError::Loader {
        path: dir.to_path_buf(),
        source,
    })
}

fn load_playlists_inner(dir: &Path, opts: &LoaderOptions) -> anyhow::Result<Vec<DesiredPlaylist>> {
    if !dir.is_dir() {
        anyhow::bail!("playlist directory does not exist");
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let p = entry.path();
        if p.is_file() && path_matches_extensions(p, &opts.extensions) {
            files.push(p.to_path_buf());
        }
    }
    files.sort();

    let mut playlists = Vec::with_capacity(files.len());
    for f in files.iter() {
        let pl = read_playlist_file(f, opts)?;
        log::debug!("Loaded playlist '{}' with {} entries", pl.name, pl.entries.len());
        playlists.push(pl);
    }
    Ok(playlists)
}

/// Narrow the loaded playlists to the requested names (all when `names` is
/// empty) and to those matching `whitelist`. Returns the kept playlists and
/// the requested names that were not found.
pub fn select_playlists(
    all: Vec<DesiredPlaylist>,
    names: &[String],
    whitelist: Option<&Regex>,
) -> (Vec<DesiredPlaylist>, Vec<String>) {
    let missing: Vec<String> = names
        .iter()
        .filter(|n| !all.iter().any(|p| &p.name == *n))
        .cloned()
        .collect();

    let kept = all
        .into_iter()
        .filter(|p| names.is_empty() || names.iter().any(|n| n == &p.name))
        .filter(|p| whitelist.map_or(true, |re| re.is_match(&p.name)))
        .collect();

    (kept, missing)
}
