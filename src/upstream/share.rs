//! Scoped share acquisition.
//!
//! Fetching a resource requires a public share of a note that contains it.
//! A [`ShareLease`] owns such a share for the duration of one fetch and
//! revokes it when released. If the lease is dropped without being released
//! (the request future was cancelled mid-fetch), revocation is spawned onto
//! the runtime instead.

use super::{NotesBackend, Session, Share};
use crate::error::Result;

use std::sync::Arc;

/// A share that is revoked once the caller is done with it.
pub struct ShareLease {
    backend: Arc<dyn NotesBackend>,
    session: Session,
    share: Share,
    armed: bool,
}

impl ShareLease {
    /// Log in and create a share for `note_id`.
    pub async fn acquire(backend: Arc<dyn NotesBackend>, note_id: &str) -> Result<Self> {
        let session = backend.login().await?;
        let share = backend.create_share(&session, note_id).await?;
        tracing::debug!(%note_id, share_id = %share.id, "share created");
        Ok(Self {
            backend,
            session,
            share,
            armed: true,
        })
    }

    pub fn share(&self) -> &Share {
        &self.share
    }

    /// Revoke the share. Revocation failures are logged, not returned.
    pub async fn release(mut self) {
        self.armed = false;
        revoke(
            self.backend.clone(),
            self.session.clone(),
            self.share.clone(),
        )
        .await;
    }
}

impl Drop for ShareLease {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = self.backend.clone();
                let session = self.session.clone();
                handle.spawn(revoke(backend, session, self.share.clone()));
            }
            Err(_) => {
                tracing::warn!(share_id = %self.share.id, "share dropped outside runtime, left unrevoked");
            }
        }
    }
}

async fn revoke(backend: Arc<dyn NotesBackend>, session: Session, share: Share) {
    match backend.revoke_share(&session, &share).await {
        Ok(()) => tracing::debug!(share_id = %share.id, "share revoked"),
        Err(error) => tracing::warn!(%error, share_id = %share.id, "failed to revoke share"),
    }
}
