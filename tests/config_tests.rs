use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

use plex_playlist_sync::config::{resolve_config_path, Config, MAX_RETRIES_ON_ERROR, TOKEN_ENV};
use plex_playlist_sync::reconcile::ReconcileOptions;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let cfg_path = dir.join("cfg.toml");
    let mut f = File::create(&cfg_path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    cfg_path
}

#[test]
fn config_from_path_applies_defaults() {
    let td = tempdir().unwrap();
    let cfg_path = write_config(
        td.path(),
        r#"
server_address = "http://plex:32400"
playlist_source_path = "/tmp/playlists"
"#,
    );
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert_eq!(cfg.server_address, "http://plex:32400");
    assert_eq!(cfg.playlist_source_path.to_str().unwrap(), "/tmp/playlists");
    assert_eq!(cfg.section, "Music");
    assert_eq!(cfg.path_prefix, "");
    assert_eq!(cfg.playlist_extensions, vec!["m3u".to_string(), "m3u8".to_string()]);
    assert_eq!(cfg.page_size, 1000);
    assert_eq!(cfg.max_batch_size, 100);
    assert_eq!(cfg.max_retries_on_error, 1);
    assert_eq!(cfg.retry_delay_ms, 1000);
    assert!(!cfg.refresh_library);
    assert!(cfg.log_dir.is_none());
    cfg.validate().expect("defaults are valid");
}

#[test]
fn config_requires_server_and_playlist_source() {
    let td = tempdir().unwrap();
    let cfg_path = write_config(td.path(), "section = \"Music\"\n");
    assert!(Config::from_path(&cfg_path).is_err());
}

#[test]
fn validate_rejects_bad_values() {
    let td = tempdir().unwrap();
    let cfg_path = write_config(
        td.path(),
        r#"
server_address = "not a url"
playlist_source_path = "/tmp/playlists"
"#,
    );
    let mut cfg = Config::from_path(&cfg_path).unwrap();
    assert!(cfg.validate().is_err());

    cfg.server_address = "http://plex:32400".into();
    cfg.validate().unwrap();

    cfg.playlist_whitelist = "([".into();
    assert!(cfg.validate().is_err());
    cfg.playlist_whitelist.clear();

    cfg.max_batch_size = 0;
    assert!(cfg.validate().is_err());
    cfg.max_batch_size = 10;

    cfg.section = "  ".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn retry_count_is_capped() {
    let td = tempdir().unwrap();
    let cfg_path = write_config(
        td.path(),
        r#"
server_address = "http://plex:32400"
playlist_source_path = "/tmp/playlists"
max_retries_on_error = 4294967295
"#,
    );
    let mut cfg = Config::from_path(&cfg_path).unwrap();
    assert!(cfg.validate().is_err());
    assert_eq!(ReconcileOptions::from_config(&cfg, false).retries, MAX_RETRIES_ON_ERROR);

    cfg.max_retries_on_error = MAX_RETRIES_ON_ERROR;
    cfg.validate().unwrap();
}

#[test]
fn token_env_overrides_file() {
    let td = tempdir().unwrap();
    let cfg_path = write_config(
        td.path(),
        r#"
server_address = "http://plex:32400"
token = "from-file"
playlist_source_path = "/tmp/playlists"
"#,
    );
    std::env::set_var(TOKEN_ENV, "from-env");
    let cfg = Config::from_path(&cfg_path).unwrap();
    std::env::remove_var(TOKEN_ENV);
    assert_eq!(cfg.token, "from-env");
}

#[test]
fn explicit_config_path_wins() {
    let p = Path::new("/some/where/cfg.toml");
    assert_eq!(resolve_config_path(Some(p)), p.to_path_buf());
}

#[test]
fn example_config_parses_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/example-config.toml");
    let cfg = Config::from_path(&path).expect("example config parses");
    cfg.validate().expect("example config is valid");
    assert_eq!(cfg.path_prefix, "/volume1/music/itunes/");
}
