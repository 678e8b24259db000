use std::fmt;

/// Server-assigned track identifier (Plex `ratingKey`). Opaque to us.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One media item as the server knows it: identifier plus the absolute file
/// path in the server's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRecord {
    pub id: TrackId,
    pub path: String,
}

impl TrackRecord {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: TrackId(id.into()),
            path: path.into(),
        }
    }
}

/// Local target state for one named playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredPlaylist {
    /// Derived from the source file name; case-sensitive.
    pub name: String,
    /// Paths in the server's form, in file order. Duplicates are kept.
    pub entries: Vec<String>,
}

/// A desired entry after lookup in the track index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub path: String,
    /// `None` when the path is not in the catalog.
    pub track: Option<TrackRecord>,
}

impl ResolvedEntry {
    pub fn is_resolved(&self) -> bool {
        self.track.is_some()
    }
}

/// One membership slot of a remote playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub track: TrackRecord,
    /// Per-membership handle used for removal (Plex `playlistItemID`).
    pub item_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePlaylist {
    pub id: String,
    pub title: String,
    pub smart: bool,
    pub items: Vec<PlaylistItem>,
}

impl RemotePlaylist {
    pub fn members(&self) -> impl Iterator<Item = &TrackRecord> {
        self.items.iter().map(|i| &i.track)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistDiff {
    pub to_add: Vec<TrackRecord>,
    pub to_remove: Vec<TrackRecord>,
}

impl PlaylistDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Created,
    Updated,
    Unchanged,
    DryRun,
    /// Absent remotely and nothing resolved, so there was nothing to create.
    Skipped,
    Failed(String),
}

/// Per-playlist statistics record produced by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistOutcome {
    pub name: String,
    /// Literal entry count, duplicates included.
    pub desired_count: usize,
    /// Entries matched to a track, duplicates included.
    pub resolved_count: usize,
    /// Remote membership size before this run (0 when newly created).
    pub pre_existing_count: usize,
    pub added: usize,
    pub removed: usize,
    pub final_count: usize,
    pub unresolved: Vec<String>,
    pub status: OutcomeStatus,
}

impl PlaylistOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }

    pub fn is_changed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Created | OutcomeStatus::Updated)
    }
}
