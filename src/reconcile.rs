use crate::api::MediaServer;
use crate::config::{Config, MAX_RETRIES_ON_ERROR};
use crate::error::SyncError;
use crate::index::TrackIndex;
use crate::models::{
    DesiredPlaylist, OutcomeStatus, PlaylistDiff, PlaylistOutcome, RemotePlaylist, ResolvedEntry, TrackId,
    TrackRecord,
};
use crate::util::with_retries;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Compute diffs but never create or mutate remote playlists.
    pub dry_run: bool,
    /// Extra attempts after a failed remote call.
    pub retries: u32,
    pub retry_delay: Duration,
    /// Most tracks sent in one add/remove/create call.
    pub batch_size: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            retries: 1,
            retry_delay: Duration::from_secs(1),
            batch_size: 100,
        }
    }
}

impl ReconcileOptions {
    pub fn from_config(cfg: &Config, dry_run: bool) -> Self {
        Self {
            dry_run,
            retries: cfg.max_retries_on_error.min(MAX_RETRIES_ON_ERROR),
            retry_delay: cfg.retry_delay(),
            batch_size: cfg.max_batch_size.max(1),
        }
    }
}

/// Look every entry up by exact path. Order and duplicates are preserved.
pub fn resolve(index: &TrackIndex, playlist: &DesiredPlaylist) -> Vec<ResolvedEntry> {
    playlist
        .entries
        .iter()
        .map(|path| ResolvedEntry {
            path: path.clone(),
            track: index.lookup(path).cloned(),
        })
        .collect()
}

/// The remote membership a playlist should end up with: resolved tracks,
/// deduplicated by id, first occurrence first.
pub fn desired_members(resolved: &[ResolvedEntry]) -> Vec<TrackRecord> {
    let mut seen: HashSet<&TrackId> = HashSet::new();
    resolved
        .iter()
        .filter_map(|e| e.track.as_ref())
        .filter(|t| seen.insert(&t.id))
        .cloned()
        .collect()
}

/// `to_add = desired - current` in desired order, `to_remove = current -
/// desired` in current order, both without duplicates. Tracks compare by id.
pub fn compute_diff(desired: &[TrackRecord], current: &[TrackRecord]) -> PlaylistDiff {
    let desired_ids: HashSet<&TrackId> = desired.iter().map(|t| &t.id).collect();
    let current_ids: HashSet<&TrackId> = current.iter().map(|t| &t.id).collect();

    let mut added: HashSet<&TrackId> = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|t| !current_ids.contains(&t.id) && added.insert(&t.id))
        .cloned()
        .collect();

    let mut removed: HashSet<&TrackId> = HashSet::new();
    let to_remove = current
        .iter()
        .filter(|t| !desired_ids.contains(&t.id) && removed.insert(&t.id))
        .cloned()
        .collect();

    PlaylistDiff { to_add, to_remove }
}

fn unique_count(tracks: &[TrackRecord]) -> usize {
    tracks.iter().map(|t| &t.id).collect::<HashSet<_>>().len()
}

/// Drives one desired playlist at a time onto the server. The index is
/// shared read-only across every playlist of the run.
pub struct Reconciler<'a> {
    server: &'a dyn MediaServer,
    index: &'a TrackIndex,
    opts: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(server: &'a dyn MediaServer, index: &'a TrackIndex, opts: ReconcileOptions) -> Self {
        Self { server, index, opts }
    }

    /// Reconcile one playlist. Never fails: remote errors end up in the
    /// outcome's status so the caller can move on to the next playlist.
    pub async fn reconcile(&self, playlist: &DesiredPlaylist) -> PlaylistOutcome {
        let resolved = resolve(self.index, playlist);
        let unresolved: Vec<String> = resolved
            .iter()
            .filter(|e| !e.is_resolved())
            .map(|e| e.path.clone())
            .collect();
        for path in &unresolved {
            log::warn!("{}: not found in catalog: {}", playlist.name, path);
        }
        let desired = desired_members(&resolved);

        let mut outcome = PlaylistOutcome {
            name: playlist.name.clone(),
            desired_count: playlist.entries.len(),
            resolved_count: resolved.len() - unresolved.len(),
            pre_existing_count: 0,
            added: 0,
            removed: 0,
            final_count: 0,
            unresolved,
            status: OutcomeStatus::Unchanged,
        };

        match self.apply(&playlist.name, &desired, &mut outcome).await {
            Ok(status) => outcome.status = status,
            Err(e) => {
                log::error!("Playlist '{}' not synced: {}", playlist.name, e);
                outcome.status = OutcomeStatus::Failed(e.to_string());
            }
        }
        outcome
    }

    async fn apply(
        &self,
        name: &str,
        desired: &[TrackRecord],
        outcome: &mut PlaylistOutcome,
    ) -> Result<OutcomeStatus, SyncError> {
        let existing = with_retries(&format!("find playlist '{}'", name), self.opts.retries, self.opts.retry_delay, || {
            self.server.find_playlist(name)
        })
        .await
        .map_err(|(source, attempts)| remote_error("find", name, attempts, source))?;

        let Some(remote) = existing else {
            if desired.is_empty() {
                log::warn!("Playlist '{}' has no resolved tracks; not creating it", name);
                return Ok(OutcomeStatus::Skipped);
            }
            outcome.added = desired.len();
            outcome.final_count = desired.len();
            if self.opts.dry_run {
                log::info!("Dry run: would create playlist '{}' with {} tracks", name, desired.len());
                return Ok(OutcomeStatus::DryRun);
            }
            self.create(name, desired).await?;
            return Ok(OutcomeStatus::Created);
        };

        if remote.smart {
            return Err(SyncError::SmartPlaylist { name: name.to_string() });
        }

        let current: Vec<TrackRecord> = remote.members().cloned().collect();
        outcome.pre_existing_count = current.len();

        let diff = compute_diff(desired, &current);
        outcome.added = diff.to_add.len();
        outcome.removed = diff.to_remove.len();
        outcome.final_count = unique_count(&current) - diff.to_remove.len() + diff.to_add.len();

        if diff.is_empty() {
            log::info!("Playlist '{}' already up to date ({} tracks)", name, outcome.final_count);
            return Ok(OutcomeStatus::Unchanged);
        }
        if self.opts.dry_run {
            log::info!(
                "Dry run: would remove {} and add {} tracks in '{}'",
                diff.to_remove.len(),
                diff.to_add.len(),
                name
            );
            return Ok(OutcomeStatus::DryRun);
        }

        // Removal first so the playlist never holds both old and new sets.
        self.remove(&remote, &diff.to_remove).await?;
        self.add(&remote, &diff.to_add).await?;
        log::info!(
            "Updated playlist '{}': removed {}, added {}",
            name,
            diff.to_remove.len(),
            diff.to_add.len()
        );
        Ok(OutcomeStatus::Updated)
    }

    async fn create(&self, name: &str, desired: &[TrackRecord]) -> Result<(), SyncError> {
        let first = desired.len().min(self.opts.batch_size);
        let (initial, rest) = desired.split_at(first);
        log::info!("Creating playlist '{}'", name);
        let created = with_retries(&format!("create playlist '{}'", name), self.opts.retries, self.opts.retry_delay, || {
            self.server.create_playlist(name, initial)
        })
        .await
        .map_err(|(source, attempts)| remote_error("create", name, attempts, source))?;
        self.add(&created, rest).await
    }

    async fn add(&self, remote: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<(), SyncError> {
        for chunk in tracks.chunks(self.opts.batch_size) {
            with_retries(
                &format!("add {} tracks to '{}'", chunk.len(), remote.title),
                self.opts.retries,
                self.opts.retry_delay,
                || self.server.add_to_playlist(remote, chunk),
            )
            .await
            .map_err(|(source, attempts)| remote_error("add", &remote.title, attempts, source))?;
        }
        Ok(())
    }

    async fn remove(&self, remote: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<(), SyncError> {
        for chunk in tracks.chunks(self.opts.batch_size) {
            with_retries(
                &format!("remove {} tracks from '{}'", chunk.len(), remote.title),
                self.opts.retries,
                self.opts.retry_delay,
                || self.server.remove_from_playlist(remote, chunk),
            )
            .await
            .map_err(|(source, attempts)| remote_error("remove", &remote.title, attempts, source))?;
        }
        Ok(())
    }
}

fn remote_error(op: &'static str, playlist: &str, attempts: u32, source: anyhow::Error) -> SyncError {
    SyncError::Remote {
        op,
        playlist: playlist.to_string(),
        attempts,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: &str) -> TrackRecord {
        TrackRecord::new(id, format!("/m/{}.mp3", id))
    }

    fn ids(tracks: &[TrackRecord]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn diff_is_set_difference_both_ways() {
        let diff = compute_diff(&[t("1"), t("2"), t("3")], &[t("2"), t("4")]);
        assert_eq!(ids(&diff.to_add), vec!["1", "3"]);
        assert_eq!(ids(&diff.to_remove), vec!["4"]);
    }

    #[test]
    fn diff_of_equal_sets_is_empty_regardless_of_order() {
        let diff = compute_diff(&[t("1"), t("2")], &[t("2"), t("1")]);
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_removes_duplicated_remote_member_once() {
        let diff = compute_diff(&[t("1")], &[t("1"), t("5"), t("5")]);
        assert!(diff.to_add.is_empty());
        assert_eq!(ids(&diff.to_remove), vec!["5"]);
    }

    #[test]
    fn resolve_keeps_order_and_marks_misses() {
        let index = TrackIndex::from_tracks(vec![t("a"), t("b")]);
        let pl = DesiredPlaylist {
            name: "p".into(),
            entries: vec!["/m/b.mp3".into(), "/m/x.mp3".into(), "/m/a.mp3".into()],
        };
        let resolved = resolve(&index, &pl);
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].track.as_ref().map(|t| t.id.as_str()), Some("b"));
        assert!(!resolved[1].is_resolved());
        assert_eq!(resolved[2].track.as_ref().map(|t| t.id.as_str()), Some("a"));
    }

    #[test]
    fn desired_members_deduplicates() {
        let index = TrackIndex::from_tracks(vec![t("a"), t("b")]);
        let pl = DesiredPlaylist {
            name: "p".into(),
            entries: vec!["/m/a.mp3".into(), "/m/a.mp3".into(), "/m/b.mp3".into()],
        };
        let members = desired_members(&resolve(&index, &pl));
        assert_eq!(ids(&members), vec!["a", "b"]);
    }
}
