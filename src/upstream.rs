//! Access to the upstream Joplin server.
//!
//! Two APIs are involved: the Data API (notes and resources, authenticated by
//! a static token) and the web server's session/share API (authenticated by a
//! session obtained from a login call). Everything the proxy needs from them
//! goes through the [`NotesBackend`] trait so handlers can be exercised
//! against an in-memory backend.

pub mod client;
pub mod share;

use crate::error::{Error, Result};

use async_trait::async_trait;
use serde::Deserialize;

pub use client::JoplinClient;
pub use share::ShareLease;

/// Longest item id accepted from a request.
const MAX_ID_LEN: usize = 64;

/// Ids end up in upstream URL paths and cache file names, so only a safe
/// alphabet is accepted. Anything else is reported as not found.
pub fn validate_id(kind: &str, id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::NotFound(format!("invalid {kind} id {id:?}")))
    }
}

/// Fields requested from the Data API for a rendered note.
pub const NOTE_FIELDS: &str = "id,parent_id,title,body";

/// A note snapshot as returned by the Data API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// An authenticated web-server session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
}

/// A public share created for a note.
#[derive(Debug, Clone, Deserialize)]
pub struct Share {
    pub id: String,
    #[serde(default)]
    pub note_id: Option<String>,
}

/// Raw resource bytes fetched through a share.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Operations the proxy performs against the upstream server.
#[async_trait]
pub trait NotesBackend: Send + Sync {
    /// Fetch a note's id, parent folder, title and body.
    async fn get_note(&self, note_id: &str) -> Result<Note>;

    /// Find a note that references the given resource.
    async fn resource_owner(&self, resource_id: &str) -> Result<String>;

    /// Log in to the web server.
    async fn login(&self) -> Result<Session>;

    /// Create a non-recursive share for a note.
    async fn create_share(&self, session: &Session, note_id: &str) -> Result<Share>;

    /// Download a resource through a share.
    async fn fetch_shared_resource(
        &self,
        share: &Share,
        resource_id: &str,
    ) -> Result<FetchedResource>;

    /// Delete a share.
    async fn revoke_share(&self, session: &Session, share: &Share) -> Result<()>;
}
