//! homebase-watch library - geofence alert client
//!
//! Polls the feed proxy, keeps a headless marker layer current and raises
//! alerts for aircraft below the altitude threshold inside the active
//! geofence or ring.

pub mod alerts;
pub mod client;
pub mod commands;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod geofence;
pub mod monitor;
pub mod poller;
pub mod render;

pub use error::{WatchError, WatchResult};
