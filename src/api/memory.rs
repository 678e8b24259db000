use super::MediaServer;
use crate::models::{PlaylistItem, RemotePlaylist, TrackRecord};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::info;

/// A mutation the in-memory server accepted, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { playlist: String, tracks: usize },
    Add { playlist: String, tracks: usize },
    Remove { playlist: String, tracks: usize },
}

#[derive(Default)]
struct State {
    playlists: Vec<RemotePlaylist>,
    next_id: u64,
    next_item_id: u64,
    fail_always: HashSet<String>,
    fail_next: HashMap<String, u32>,
    failed_sections: HashSet<String>,
    mutations: Vec<Mutation>,
    refreshes: Vec<String>,
}

/// In-memory catalog and playlist store used in tests and dry experiments.
/// Playlist titles are matched exactly, like the real server does.
pub struct MemoryServer {
    sections: HashMap<String, Vec<TrackRecord>>,
    state: Mutex<State>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self {
            sections: HashMap::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_section(mut self, section: &str, tracks: Vec<TrackRecord>) -> Self {
        self.sections.insert(section.to_string(), tracks);
        self
    }

    /// Seed a playlist as if someone had created it on the server.
    pub fn with_playlist(self, name: &str, tracks: &[TrackRecord]) -> Self {
        {
            let mut st = self.lock();
            let pl = new_playlist(&mut st, name, tracks);
            st.playlists.push(pl);
        }
        self
    }

    pub fn with_smart_playlist(self, name: &str) -> Self {
        {
            let mut st = self.lock();
            let mut pl = new_playlist(&mut st, name, &[]);
            pl.smart = true;
            st.playlists.push(pl);
        }
        self
    }

    /// Every fetch of `section` fails.
    pub fn fail_section(&self, section: &str) {
        self.lock().failed_sections.insert(section.to_string());
    }

    /// Every call touching playlist `name` fails.
    pub fn fail_always(&self, name: &str) {
        self.lock().fail_always.insert(name.to_string());
    }

    /// The next `n` calls touching playlist `name` fail.
    pub fn fail_next(&self, name: &str, n: u32) {
        self.lock().fail_next.insert(name.to_string(), n);
    }

    pub fn playlist(&self, name: &str) -> Option<RemotePlaylist> {
        self.lock().playlists.iter().find(|p| p.title == name).cloned()
    }

    pub fn playlist_names(&self) -> Vec<String> {
        self.lock().playlists.iter().map(|p| p.title.clone()).collect()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    pub fn refreshes(&self) -> Vec<String> {
        self.lock().refreshes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Poisoned state is still consistent: every mutation is a single push or retain.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

fn new_playlist(st: &mut State, name: &str, tracks: &[TrackRecord]) -> RemotePlaylist {
    st.next_id += 1;
    let mut pl = RemotePlaylist {
        id: format!("mem-playlist-{}", st.next_id),
        title: name.to_string(),
        smart: false,
        items: Vec::new(),
    };
    push_items(st, &mut pl, tracks);
    pl
}

fn push_items(st: &mut State, pl: &mut RemotePlaylist, tracks: &[TrackRecord]) {
    for t in tracks {
        st.next_item_id += 1;
        pl.items.push(PlaylistItem {
            track: t.clone(),
            item_id: Some(st.next_item_id),
        });
    }
}

fn check_failure(st: &mut State, name: &str, op: &str) -> Result<()> {
    if st.fail_always.contains(name) {
        return Err(anyhow!("memory server: injected {} failure for '{}'", op, name));
    }
    if let Some(n) = st.fail_next.get_mut(name) {
        if *n > 0 {
            *n -= 1;
            return Err(anyhow!("memory server: injected transient {} failure for '{}'", op, name));
        }
    }
    Ok(())
}

#[async_trait]
impl MediaServer for MemoryServer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_section_tracks(&self, section: &str) -> Result<Vec<TrackRecord>> {
        if self.lock().failed_sections.contains(section) {
            return Err(anyhow!("memory server: section '{}' unavailable", section));
        }
        self.sections
            .get(section)
            .cloned()
            .ok_or_else(|| anyhow!("memory server: no section named '{}'", section))
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<RemotePlaylist>> {
        let mut st = self.lock();
        check_failure(&mut st, name, "find")?;
        Ok(st.playlists.iter().find(|p| p.title == name).cloned())
    }

    async fn create_playlist(&self, name: &str, initial_members: &[TrackRecord]) -> Result<RemotePlaylist> {
        let mut st = self.lock();
        check_failure(&mut st, name, "create")?;
        info!("MemoryServer: create_playlist {} with {} tracks", name, initial_members.len());
        let pl = new_playlist(&mut st, name, initial_members);
        st.playlists.push(pl.clone());
        st.mutations.push(Mutation::Create {
            playlist: name.to_string(),
            tracks: initial_members.len(),
        });
        Ok(pl)
    }

    async fn add_to_playlist(&self, playlist: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<()> {
        let mut st = self.lock();
        check_failure(&mut st, &playlist.title, "add")?;
        info!("MemoryServer: add_to_playlist {} -> {} tracks", playlist.title, tracks.len());
        let idx = st
            .playlists
            .iter()
            .position(|p| p.id == playlist.id)
            .ok_or_else(|| anyhow!("memory server: no playlist with id {}", playlist.id))?;
        let mut pl = st.playlists[idx].clone();
        push_items(&mut st, &mut pl, tracks);
        st.playlists[idx] = pl;
        st.mutations.push(Mutation::Add {
            playlist: playlist.title.clone(),
            tracks: tracks.len(),
        });
        Ok(())
    }

    async fn remove_from_playlist(&self, playlist: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<()> {
        let mut st = self.lock();
        check_failure(&mut st, &playlist.title, "remove")?;
        info!("MemoryServer: remove_from_playlist {} -> {} tracks", playlist.title, tracks.len());
        let ids: HashSet<_> = tracks.iter().map(|t| &t.id).collect();
        let pl = st
            .playlists
            .iter_mut()
            .find(|p| p.id == playlist.id)
            .ok_or_else(|| anyhow!("memory server: no playlist with id {}", playlist.id))?;
        pl.items.retain(|i| !ids.contains(&i.track.id));
        st.mutations.push(Mutation::Remove {
            playlist: playlist.title.clone(),
            tracks: tracks.len(),
        });
        Ok(())
    }

    async fn refresh_section(&self, section: &str) -> Result<()> {
        self.lock().refreshes.push(section.to_string());
        Ok(())
    }
}
