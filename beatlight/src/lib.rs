//! # beatlight: music-synchronised LED service
//!
//! Follows a playing track through a [`beatlight_core::SyncEngine`],
//! flashes the strip on each structural event of the configured kind
//! and streams the result to a WLED-style controller over UDP.
//!
//! ## Modes
//!
//! - **Live**: send index-addressed updates to `led.host:led.port`.
//! - **Dry run**: run the whole pipeline but only log the datagrams (`--dry-run`).

pub mod config;
pub mod effect;
pub mod service;
pub mod sources;
