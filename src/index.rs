use crate::api::MediaServer;
use crate::error::SyncError;
use crate::models::TrackRecord;
use std::collections::HashMap;

/// Lookup from server-side file path to track, built once per run.
///
/// Paths are compared byte-exact: no case folding, no slash or symlink
/// normalization beyond what the server already returns.
#[derive(Debug, Default)]
pub struct TrackIndex {
    by_path: HashMap<String, TrackRecord>,
    duplicates: usize,
}

impl TrackIndex {
    /// Build from a catalog listing. When two records share a path the later
    /// one wins and the collision is counted.
    pub fn from_tracks<I>(tracks: I) -> Self
    where
        I: IntoIterator<Item = TrackRecord>,
    {
        let mut by_path = HashMap::new();
        let mut duplicates = 0usize;
        for t in tracks {
            if let Some(prev) = by_path.insert(t.path.clone(), t) {
                duplicates += 1;
                log::debug!("Duplicate catalog path {} (replacing track {})", prev.path, prev.id);
            }
        }
        Self { by_path, duplicates }
    }

    pub fn lookup(&self, path: &str) -> Option<&TrackRecord> {
        self.by_path.get(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Number of catalog records shadowed by a later record with the same path.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// Fetch every track of `section` and index it. Any failure here is fatal for
/// the run: reconciling against a partial catalog would remove tracks that
/// merely failed to load.
pub async fn build_track_index(server: &dyn MediaServer, section: &str) -> Result<TrackIndex, SyncError> {
    log::info!("Fetching track catalog for section '{}' from {}", section, server.name());
    let tracks = server
        .fetch_section_tracks(section)
        .await
        .map_err(|source| SyncError::Catalog {
            section: section.to_string(),
            source,
        })?;

    let index = TrackIndex::from_tracks(tracks);
    if index.duplicates() > 0 {
        log::warn!(
            "Section '{}' lists {} duplicate paths; the last record for each path is used",
            section,
            index.duplicates()
        );
    }
    log::info!("Indexed {} tracks by path", index.len());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<TrackRecord> {
        vec![
            TrackRecord::new("1", "/m/a.mp3"),
            TrackRecord::new("2", "/m/b.mp3"),
        ]
    }

    #[test]
    fn lookup_returns_exact_path() {
        let idx = TrackIndex::from_tracks(catalog());
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.lookup("/m/a.mp3").map(|t| t.id.as_str()), Some("1"));
        assert_eq!(idx.lookup("/m/b.mp3").map(|t| t.id.as_str()), Some("2"));
        assert!(idx.lookup("/m/c.mp3").is_none());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let idx = TrackIndex::from_tracks(catalog());
        assert!(idx.lookup("/m/A.mp3").is_none());
        assert!(idx.lookup("/M/a.mp3").is_none());
    }

    #[test]
    fn no_slash_normalization() {
        let idx = TrackIndex::from_tracks(catalog());
        assert!(idx.lookup("/m//a.mp3").is_none());
        assert!(idx.lookup("\\m\\a.mp3").is_none());
    }

    #[test]
    fn duplicate_path_last_write_wins() {
        let idx = TrackIndex::from_tracks(vec![
            TrackRecord::new("1", "/m/a.mp3"),
            TrackRecord::new("9", "/m/a.mp3"),
        ]);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.duplicates(), 1);
        assert_eq!(idx.lookup("/m/a.mp3").map(|t| t.id.as_str()), Some("9"));
    }
}
