//! HTTP client for the Joplin Data API and web server.

use super::{FetchedResource, NOTE_FIELDS, Note, NotesBackend, Session, Share, validate_id};
use crate::config::ProxyConfig;
use crate::error::{Error, Result};

use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use std::sync::Arc;

/// Header carrying the session id on web-server API calls.
const SESSION_HEADER: &str = "X-Api-Auth";

#[derive(Deserialize)]
struct NoteRef {
    id: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// [`NotesBackend`] backed by the real upstream server.
#[derive(Clone)]
pub struct JoplinClient {
    http: reqwest::Client,
    config: Arc<ProxyConfig>,
}

impl JoplinClient {
    pub fn new(config: Arc<ProxyConfig>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("joplin-proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }
}

fn unreachable(error: reqwest::Error) -> Error {
    Error::UpstreamUnreachable(error.to_string())
}

#[async_trait]
impl NotesBackend for JoplinClient {
    async fn get_note(&self, note_id: &str) -> Result<Note> {
        validate_id("note", note_id)?;
        let (api_url, token) = self.config.data_api()?;
        let response = self
            .http
            .get(format!("{api_url}/notes/{note_id}"))
            .query(&[("token", token), ("fields", NOTE_FIELDS)])
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            tracing::debug!(%note_id, status = %response.status(), "note lookup rejected upstream");
            return Err(Error::NotFound(format!("note {note_id}")));
        }

        let note: Note = response.json().await.map_err(|error| {
            if error.is_decode() {
                Error::NotFound(format!("note {note_id} (undecodable)"))
            } else {
                unreachable(error)
            }
        })?;
        Ok(note)
    }

    async fn resource_owner(&self, resource_id: &str) -> Result<String> {
        validate_id("resource", resource_id)?;
        let (api_url, token) = self.config.data_api()?;
        let response = self
            .http
            .get(format!("{api_url}/resources/{resource_id}/notes"))
            .query(&[("token", token), ("fields", "id")])
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            return Err(Error::NotFound(format!("resource {resource_id}")));
        }

        let page: Page<NoteRef> = response
            .json()
            .await
            .map_err(|_| Error::NotFound(format!("resource {resource_id} (undecodable)")))?;

        page.items
            .into_iter()
            .next()
            .map(|note| note.id)
            .ok_or_else(|| Error::NotFound(format!("resource {resource_id} has no owning note")))
    }

    async fn login(&self) -> Result<Session> {
        let (server_url, username, password) = self.config.server_login()?;
        let response = self
            .http
            .post(format!("{server_url}/api/sessions"))
            .header(header::ACCEPT, "application/json")
            .json(&serde_json::json!({ "email": username, "password": password }))
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "upstream login rejected");
            return Err(Error::NotFound("session".to_string()));
        }

        response
            .json()
            .await
            .map_err(|_| Error::NotFound("session (undecodable)".to_string()))
    }

    async fn create_share(&self, session: &Session, note_id: &str) -> Result<Share> {
        let (server_url, _, _) = self.config.server_login()?;
        let response = self
            .http
            .post(format!("{server_url}/api/shares"))
            .header(header::ACCEPT, "application/json")
            .header(SESSION_HEADER, &session.id)
            .json(&serde_json::json!({ "note_id": note_id, "recursive": 0 }))
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            tracing::warn!(%note_id, status = %response.status(), "share creation rejected");
            return Err(Error::NotFound(format!("share for note {note_id}")));
        }

        response
            .json()
            .await
            .map_err(|_| Error::NotFound(format!("share for note {note_id} (undecodable)")))
    }

    async fn fetch_shared_resource(
        &self,
        share: &Share,
        resource_id: &str,
    ) -> Result<FetchedResource> {
        let (server_url, _, _) = self.config.server_login()?;
        let response = self
            .http
            .get(format!("{server_url}/shares/{}", share.id))
            .query(&[("resource_id", resource_id)])
            .timeout(self.config.resource_timeout)
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            return Err(Error::NotFound(format!("shared resource {resource_id}")));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(unreachable)?.to_vec();

        Ok(FetchedResource {
            bytes,
            content_type,
        })
    }

    async fn revoke_share(&self, session: &Session, share: &Share) -> Result<()> {
        let (server_url, _, _) = self.config.server_login()?;
        let response = self
            .http
            .delete(format!("{server_url}/api/shares/{}", share.id))
            .header(SESSION_HEADER, &session.id)
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            return Err(Error::NotFound(format!("share {}", share.id)));
        }
        Ok(())
    }
}
