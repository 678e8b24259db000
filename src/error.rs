use std::path::PathBuf;

/// Failures the sync run branches on. Everything else travels as
/// `anyhow::Error` with context attached.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The catalog could not be fetched; nothing can be reconciled.
    #[error("failed to build track index for section '{section}': {source:#}")]
    Catalog {
        section: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load playlists from {}: {source:#}", .path.display())]
    Loader {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{op} failed for playlist '{playlist}' after {attempts} attempt(s): {source:#}")]
    Remote {
        op: &'static str,
        playlist: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("remote playlist '{name}' is a smart playlist and cannot be edited")]
    SmartPlaylist { name: String },
}

impl SyncError {
    /// True for errors that abort the whole run rather than one playlist.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Catalog { .. } | SyncError::Loader { .. })
    }
}
