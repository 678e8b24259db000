use crate::models::{OutcomeStatus, PlaylistOutcome};

/// `Favorites: 3 desired, 2 resolved, 1 existing`, with the cause appended
/// for playlists that could not be synced.
pub fn playlist_line(outcome: &PlaylistOutcome) -> String {
    let mut line = format!(
        "{}: {} desired, {} resolved, {} existing",
        outcome.name, outcome.desired_count, outcome.resolved_count, outcome.pre_existing_count
    );
    match &outcome.status {
        OutcomeStatus::Failed(cause) => line.push_str(&format!(" (failed: {})", cause)),
        OutcomeStatus::Skipped => line.push_str(" (skipped: no resolved tracks)"),
        _ => {}
    }
    line
}

/// Closing line of a run.
pub fn summary_line(outcomes: &[PlaylistOutcome]) -> String {
    let updated = outcomes.iter().filter(|o| o.is_changed()).count();
    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    format!(
        "Finished. {} playlists done, {} updated, {} failed.",
        outcomes.len(),
        updated,
        failed
    )
}
