use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the media server, e.g. "http://plex:32400".
    pub server_address: String,
    #[serde(default)]
    pub token: String,
    /// Library section to index, by title or key.
    #[serde(default = "default_section")]
    pub section: String,
    /// Directory holding the exported playlist files.
    pub playlist_source_path: PathBuf,
    /// Prepended to every playlist entry to get the server's path form.
    #[serde(default)]
    pub path_prefix: String,
    #[serde(default = "default_playlist_extensions")]
    pub playlist_extensions: Vec<String>,
    /// Regex over playlist names; empty means every playlist.
    #[serde(default)]
    pub playlist_whitelist: String,
    /// Ask the server to rescan the section before indexing.
    #[serde(default)]
    pub refresh_library: bool,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries_on_error: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_section() -> String { "Music".into() }
fn default_page_size() -> u32 { 1000 }
fn default_max_batch_size() -> usize { 100 }
fn default_max_retries() -> u32 { 1 }
fn default_retry_delay_ms() -> u64 { 1000 }

fn default_playlist_extensions() -> Vec<String> {
    vec!["m3u", "m3u8"].into_iter().map(String::from).collect()
}

/// Upper bound for `max_retries_on_error`.
pub const MAX_RETRIES_ON_ERROR: u32 = 10;

/// Environment variable that overrides `token` from the file.
pub const TOKEN_ENV: &str = "PLEX_TOKEN";

impl Config {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let mut cfg: Config = toml::from_str(&s)?;
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                cfg.token = token;
            }
        }
        Ok(cfg)
    }

    /// Check the values serde cannot: URL syntax, sizes, the whitelist regex.
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.server_address)
            .with_context(|| format!("invalid server_address '{}'", self.server_address))?;
        if self.section.trim().is_empty() {
            return Err(anyhow!("section must not be empty"));
        }
        if self.page_size == 0 {
            return Err(anyhow!("page_size must be greater than zero"));
        }
        if self.max_batch_size == 0 {
            return Err(anyhow!("max_batch_size must be greater than zero"));
        }
        if self.max_retries_on_error > MAX_RETRIES_ON_ERROR {
            return Err(anyhow!(
                "max_retries_on_error must be at most {} (got {})",
                MAX_RETRIES_ON_ERROR,
                self.max_retries_on_error
            ));
        }
        if !self.playlist_whitelist.is_empty() {
            regex::Regex::new(&self.playlist_whitelist)
                .with_context(|| format!("invalid playlist_whitelist '{}'", self.playlist_whitelist))?;
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }
}

/// Resolve the config file: explicit path, then the per-user config dir,
/// then the system-wide location.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("plex-playlist-sync").join("config.toml");
        if user.exists() {
            return user;
        }
    }
    PathBuf::from("/etc/plex-playlist-sync/config.toml")
}
