use super::MediaServer;
use crate::models::{PlaylistItem, RemotePlaylist, TrackId, TrackRecord};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

const TOKEN_HEADER: &str = "X-Plex-Token";

/* ---------- Response shapes ---------- */

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

/// List-style container. `Metadata` is omitted entirely when empty.
#[derive(Debug, Deserialize)]
struct MetadataContainer<T> {
    #[serde(rename = "totalSize", default)]
    total_size: Option<u32>,
    #[serde(rename = "Metadata", default = "Vec::new")]
    metadata: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    title: String,
    #[serde(rename = "type", default)]
    section_type: String,
}

#[derive(Debug, Deserialize)]
struct IdentityContainer {
    #[serde(rename = "machineIdentifier")]
    machine_identifier: String,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "playlistItemID", default)]
    playlist_item_id: Option<u64>,
    #[serde(rename = "Media", default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(rename = "Part", default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    file: Option<String>,
}

impl Track {
    /// Path of the first media part, which is what the server reports as the
    /// track's location.
    fn location(&self) -> Option<&str> {
        self.media
            .iter()
            .flat_map(|m| m.parts.iter())
            .find_map(|p| p.file.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct Playlist {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "playlistType", default)]
    playlist_type: String,
    #[serde(default)]
    smart: Option<bool>,
}

/* ---------- Client ---------- */

/// Plex Media Server backed by its HTTP API.
pub struct PlexServer {
    client: Client,
    base_url: Url,
    token: String,
    page_size: u32,
    machine_id: tokio::sync::Mutex<Option<String>>,
}

impl PlexServer {
    pub fn new(base_url: &str, token: &str, page_size: u32) -> Result<Self> {
        let mut base_url = Url::parse(base_url).with_context(|| format!("invalid server address '{}'", base_url))?;
        // Keep any path prefix (reverse proxies) when joining endpoint paths.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            token: token.to_string(),
            page_size: page_size.max(1),
            machine_id: tokio::sync::Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("building url for {}", path))
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.token)
    }

    async fn sections(&self) -> Result<Vec<Section>> {
        let url = self.url("library/sections")?;
        let res = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<SectionsContainer>>()
            .await
            .context("decoding library sections")?;
        Ok(res.media_container.directories)
    }

    /// Resolve a section by exact title or key.
    async fn section_key(&self, section: &str) -> Result<String> {
        let sections = self.sections().await?;
        let found = sections
            .iter()
            .find(|s| s.title == section)
            .or_else(|| sections.iter().find(|s| s.key == section))
            .ok_or_else(|| anyhow!("no library section named '{}'", section))?;
        if found.section_type != "artist" {
            warn!(
                "Section '{}' has type '{}', not a music library",
                found.title, found.section_type
            );
        }
        Ok(found.key.clone())
    }

    async fn tracks_page(&self, key: &str, start: u32) -> Result<MetadataContainer<Track>> {
        let mut url = self.url(&format!("library/sections/{}/all", key))?;
        url.query_pairs_mut().append_pair("type", "10");
        let res = self
            .get(url)
            .header("X-Plex-Container-Start", start.to_string())
            .header("X-Plex-Container-Size", self.page_size.to_string())
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<MetadataContainer<Track>>>()
            .await
            .context("decoding library tracks page")?;
        Ok(res.media_container)
    }

    async fn machine_identifier(&self) -> Result<String> {
        let mut cached = self.machine_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }
        let url = self.url("identity")?;
        let res = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<IdentityContainer>>()
            .await
            .context("decoding server identity")?;
        let id = res.media_container.machine_identifier;
        debug!("Plex machine identifier: {}", id);
        *cached = Some(id.clone());
        Ok(id)
    }

    /// `server://` URI naming a set of library items, as the playlist
    /// endpoints expect.
    async fn items_uri(&self, tracks: &[TrackRecord]) -> Result<String> {
        let machine = self.machine_identifier().await?;
        let keys: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        Ok(format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine,
            keys.join(",")
        ))
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>> {
        let url = self.url(&format!("playlists/{}/items", playlist_id))?;
        let res = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<MetadataContainer<Track>>>()
            .await
            .context("decoding playlist items")?;
        Ok(res
            .media_container
            .metadata
            .into_iter()
            .map(|t| PlaylistItem {
                track: TrackRecord {
                    path: t.location().unwrap_or_default().to_string(),
                    id: TrackId(t.rating_key),
                },
                item_id: t.playlist_item_id,
            })
            .collect())
    }
}

#[async_trait]
impl MediaServer for PlexServer {
    fn name(&self) -> &str {
        "plex"
    }

    async fn fetch_section_tracks(&self, section: &str) -> Result<Vec<TrackRecord>> {
        let key = self.section_key(section).await?;
        let mut out: Vec<TrackRecord> = Vec::new();
        let mut start: u32 = 0;
        let mut skipped = 0usize;

        loop {
            let page = self.tracks_page(&key, start).await?;
            if page.metadata.is_empty() {
                break;
            }
            start += page.metadata.len() as u32;
            for t in page.metadata {
                match t.location() {
                    Some(path) => out.push(TrackRecord {
                        path: path.to_string(),
                        id: TrackId(t.rating_key),
                    }),
                    None => {
                        skipped += 1;
                        debug!("Track '{}' ({}) has no file location", t.title, t.rating_key);
                    }
                }
            }
            if let Some(total) = page.total_size {
                if start >= total {
                    break;
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} tracks without a file location in section '{}'", skipped, section);
        }
        info!("Fetched {} tracks from section '{}'", out.len(), section);
        Ok(out)
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<RemotePlaylist>> {
        let mut url = self.url("playlists")?;
        url.query_pairs_mut().append_pair("playlistType", "audio");
        let res = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<MetadataContainer<Playlist>>>()
            .await
            .context("decoding playlists")?;

        let found = res
            .media_container
            .metadata
            .into_iter()
            .filter(|p| p.playlist_type.is_empty() || p.playlist_type == "audio")
            .find(|p| p.title == name);

        let Some(p) = found else {
            return Ok(None);
        };
        let items = self.playlist_items(&p.rating_key).await?;
        Ok(Some(RemotePlaylist {
            id: p.rating_key,
            title: p.title,
            smart: p.smart.unwrap_or(false),
            items,
        }))
    }

    async fn create_playlist(&self, name: &str, initial_members: &[TrackRecord]) -> Result<RemotePlaylist> {
        if initial_members.is_empty() {
            return Err(anyhow!("Plex cannot create playlist '{}' without items", name));
        }
        let uri = self.items_uri(initial_members).await?;
        let mut url = self.url("playlists")?;
        url.query_pairs_mut()
            .append_pair("type", "audio")
            .append_pair("title", name)
            .append_pair("smart", "0")
            .append_pair("uri", &uri);

        let res = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<MetadataContainer<Playlist>>>()
            .await
            .context("decoding create playlist response")?;

        let p = res
            .media_container
            .metadata
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("create playlist response for '{}' had no Metadata", name))?;
        info!("Created Plex playlist '{}' ({})", p.title, p.rating_key);

        // Nothing may fail after the POST succeeded, or a retry would create a
        // second playlist with the same title.
        Ok(RemotePlaylist {
            id: p.rating_key,
            title: p.title,
            smart: false,
            items: Vec::new(),
        })
    }

    async fn add_to_playlist(&self, playlist: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }
        let uri = self.items_uri(tracks).await?;
        let mut url = self.url(&format!("playlists/{}/items", playlist.id))?;
        url.query_pairs_mut().append_pair("uri", &uri);

        self.client
            .put(url)
            .header(ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("adding {} tracks to '{}'", tracks.len(), playlist.title))?;
        Ok(())
    }

    async fn remove_from_playlist(&self, playlist: &RemotePlaylist, tracks: &[TrackRecord]) -> Result<()> {
        let ids: HashSet<&TrackId> = tracks.iter().map(|t| &t.id).collect();
        for item in playlist.items.iter().filter(|i| ids.contains(&i.track.id)) {
            let item_id = item.item_id.ok_or_else(|| {
                anyhow!(
                    "track {} in '{}' has no playlistItemID",
                    item.track.id,
                    playlist.title
                )
            })?;
            let url = self.url(&format!("playlists/{}/items/{}", playlist.id, item_id))?;
            let resp = self.client.delete(url).header(TOKEN_HEADER, &self.token).send().await?;
            // Already gone, e.g. removed by an earlier attempt of this batch.
            if resp.status() == StatusCode::NOT_FOUND {
                debug!("Item {} of '{}' already removed", item_id, playlist.title);
                continue;
            }
            resp.error_for_status()
                .with_context(|| format!("removing track {} from '{}'", item.track.id, playlist.title))?;
        }
        Ok(())
    }

    async fn refresh_section(&self, section: &str) -> Result<()> {
        let key = self.section_key(section).await?;
        let url = self.url(&format!("library/sections/{}/refresh", key))?;
        self.get(url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("refreshing section '{}'", section))?;
        info!("Requested rescan of section '{}'", section);
        Ok(())
    }
}
