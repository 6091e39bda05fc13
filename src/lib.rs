//! Joplin note proxy: renders notes as sanitized HTML pages and serves their
//! resources from a transcoding disk cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod notes;
pub mod render;
pub mod resources;
pub mod rewrite;
pub mod transcode;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
