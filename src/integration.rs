//! Integration layer connecting detection feeds, the editing session and
//! downstream exports.
//!
//! This module provides the streaming loader and exporter for line-delimited
//! JSON feeds (optionally gzip-compressed), the command vocabulary accepted by
//! a [`Session`], and a cooperative [`CancelToken`] for long passes.

mod cancel;
mod command;
mod exporter;
mod feed;
mod loader;
mod session;

pub use cancel::CancelToken;
pub use command::{Command, Outcome};
pub use exporter::{EnrichReport, enrich, identity_map, write_identity_map};
pub use feed::{FeedWriter, open_feed};
pub use loader::{LoadReport, load, load_path, spawn_load};
pub use session::Session;
