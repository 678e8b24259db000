use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;

use plex_playlist_sync::error::SyncError;
use plex_playlist_sync::models::DesiredPlaylist;
use plex_playlist_sync::playlist::{self, LoaderOptions};

fn opts(prefix: &str) -> LoaderOptions {
    LoaderOptions {
        extensions: vec!["m3u".to_string(), "*.m3u8".to_string()],
        path_prefix: prefix.to_string(),
    }
}

#[test]
fn convert_entry_rewrites_dos_relative_paths() {
    assert_eq!(
        playlist::convert_entry("..\\Music\\Artist\\01 a.mp3\r", "/volume1/music/itunes/"),
        "/volume1/music/itunes/Music/Artist/01 a.mp3"
    );
    assert_eq!(playlist::convert_entry("../../Music/b.mp3", "/srv/"), "/srv/Music/b.mp3");
    assert_eq!(playlist::convert_entry("./c.mp3", ""), "c.mp3");
    // Dots that are part of a name survive.
    assert_eq!(playlist::convert_entry(".hidden/d.mp3", "/x/"), "/x/.hidden/d.mp3");
}

#[test]
fn parse_skips_comments_and_blanks_keeps_duplicates() {
    let text = "#EXTM3U\n#EXTINF:-1,a\n..\\a.mp3\n\n..\\b.mp3\n..\\a.mp3\n";
    let entries = playlist::parse_playlist(text, "/m/");
    assert_eq!(entries, vec!["/m/a.mp3", "/m/b.mp3", "/m/a.mp3"]);
}

#[test]
fn load_playlists_sorted_by_file_name() {
    let td = tempdir().unwrap();
    let root = td.path();
    for (name, body) in [
        ("ballads.m3u", "..\\r.mp3\n"),
        ("Rock.m3u", "..\\R.mp3\n"),
        ("Chill.M3U8", "#EXTM3U\n..\\c.mp3\n"),
    ] {
        let mut f = File::create(root.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }
    // Not a playlist, and nested directories are not scanned.
    File::create(root.join("notes.txt")).unwrap();
    fs::create_dir_all(root.join("sub")).unwrap();
    File::create(root.join("sub").join("Nested.m3u")).unwrap();

    let pls = playlist::load_playlists(root, &opts("/m/")).unwrap();
    let names: Vec<&str> = pls.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Chill", "Rock", "ballads"]);
    assert_eq!(pls[0].entries, vec!["/m/c.mp3"]);
    assert_eq!(pls[1].entries, vec!["/m/R.mp3"]);
    assert_eq!(pls[2].entries, vec!["/m/r.mp3"]);
}

#[test]
fn missing_directory_is_a_loader_error() {
    let td = tempdir().unwrap();
    let err = playlist::load_playlists(&td.path().join("nope"), &opts("")).unwrap_err();
    assert!(matches!(err, SyncError::Loader { .. }));
    assert!(err.is_fatal());
}

#[test]
fn select_playlists_by_name_and_whitelist() {
    let all = vec![
        DesiredPlaylist { name: "Favorites".into(), entries: vec![] },
        DesiredPlaylist { name: "Rock".into(), entries: vec![] },
        DesiredPlaylist { name: "rock".into(), entries: vec![] },
    ];

    let (kept, missing) = playlist::select_playlists(all.clone(), &[], None);
    assert_eq!(kept.len(), 3);
    assert!(missing.is_empty());

    let wanted = vec!["Rock".to_string(), "Jazz".to_string()];
    let (kept, missing) = playlist::select_playlists(all.clone(), &wanted, None);
    assert_eq!(kept.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["Rock"]);
    assert_eq!(missing, vec!["Jazz".to_string()]);

    let re = regex::Regex::new("^[A-Z]").unwrap();
    let (kept, _) = playlist::select_playlists(all, &[], Some(&re));
    assert_eq!(kept.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["Favorites", "Rock"]);
}
