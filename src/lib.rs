//! Core library for plex-playlist-sync
pub mod config;
pub mod error;
pub mod models;
pub mod api;
pub mod index;
pub mod playlist;
pub mod reconcile;
pub mod report;
pub mod sync;
pub mod util;
