//! In-memory upstream used by unit tests.

use crate::error::{Error, Result};
use crate::upstream::{FetchedResource, Note, NotesBackend, Session, Share};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    notes: AtomicUsize,
    owners: AtomicUsize,
    logins: AtomicUsize,
    created: AtomicUsize,
    fetched: AtomicUsize,
    revoked: AtomicUsize,
}

impl CallCounts {
    pub fn note_fetches(&self) -> usize {
        self.notes.load(Ordering::SeqCst)
    }

    pub fn shares_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn shares_revoked(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Every call made against the backend, whatever the operation.
    pub fn total(&self) -> usize {
        [
            &self.notes,
            &self.owners,
            &self.logins,
            &self.created,
            &self.fetched,
            &self.revoked,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }
}

/// Fake upstream holding notes and resources in maps.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub notes: HashMap<String, Note>,
    /// Resource id to (owning note id, payload).
    pub resources: HashMap<String, (String, FetchedResource)>,
    pub fail_login: bool,
    /// Downloads through a share fail with an upstream error status.
    pub fail_fetch: bool,
    /// Every call fails as if the server were down.
    pub unreachable: bool,
    pub calls: CallCounts,
}

impl FakeBackend {
    pub fn with_note(mut self, id: &str, parent_id: &str, title: &str, body: &str) -> Self {
        self.notes.insert(
            id.to_string(),
            Note {
                id: id.to_string(),
                parent_id: parent_id.to_string(),
                title: title.to_string(),
                body: body.to_string(),
            },
        );
        self
    }

    pub fn with_resource(
        mut self,
        id: &str,
        owner: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Self {
        self.resources.insert(
            id.to_string(),
            (
                owner.to_string(),
                FetchedResource {
                    bytes,
                    content_type: Some(content_type.to_string()),
                },
            ),
        );
        self
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            Err(Error::UpstreamUnreachable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotesBackend for FakeBackend {
    async fn get_note(&self, note_id: &str) -> Result<Note> {
        self.calls.notes.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.notes
            .get(note_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))
    }

    async fn resource_owner(&self, resource_id: &str) -> Result<String> {
        self.calls.owners.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.resources
            .get(resource_id)
            .map(|(owner, _)| owner.clone())
            .ok_or_else(|| Error::NotFound(format!("resource {resource_id}")))
    }

    async fn login(&self) -> Result<Session> {
        self.calls.logins.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.fail_login {
            return Err(Error::NotFound("session".to_string()));
        }
        Ok(Session {
            id: "session-1".to_string(),
        })
    }

    async fn create_share(&self, _session: &Session, note_id: &str) -> Result<Share> {
        let n = self.calls.created.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(Share {
            id: format!("share-{n}"),
            note_id: Some(note_id.to_string()),
        })
    }

    async fn fetch_shared_resource(
        &self,
        _share: &Share,
        resource_id: &str,
    ) -> Result<FetchedResource> {
        self.calls.fetched.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.fail_fetch {
            return Err(Error::NotFound(format!("shared resource {resource_id}")));
        }
        self.resources
            .get(resource_id)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| Error::NotFound(format!("shared resource {resource_id}")))
    }

    async fn revoke_share(&self, _session: &Session, _share: &Share) -> Result<()> {
        self.calls.revoked.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()
    }
}
