pub mod memory;
pub mod plex;

use crate::models::{RemotePlaylist, TrackRecord};
use anyhow::Result;

/// The media server operations the sync needs.
/// Implementations: plex::PlexServer (HTTP) and memory::MemoryServer (tests).
#[async_trait::async_trait]
pub trait MediaServer: Send + Sync {
    /// Every track visible in the section, with its server-side path.
    async fn fetch_section_tracks(&self, section: &str) -> Result<Vec<TrackRecord>>;

    /// Look up a playlist by exact, case-sensitive title, with its current membership.
    async fn find_playlist(&self, name: &str) -> Result<Option<RemotePlaylist>>;

    /// Create a playlist holding `initial_members` in the given order. The
    /// returned playlist carries the id and title; `items` may be left empty.
    async fn create_playlist(&self, name: &str, initial_members: &[TrackRecord]) -> Result<RemotePlaylist>;

    /// Append tracks to the playlist (batching done by caller).
    async fn add_to_playlist(&self, playlist: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<()>;

    /// Remove every membership slot holding one of `tracks`.
    async fn remove_from_playlist(&self, playlist: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<()>;

    /// Ask the server to rescan the section. Default implementation does nothing.
    async fn refresh_section(&self, _section: &str) -> Result<()> {
        Ok(())
    }

    /// Return the server kind (for logging)
    fn name(&self) -> &str;
}
