//! Resource serving: cache lookup, upstream fetch through a share, transcode,
//! store.

use crate::cache::ResourceCache;
use crate::error::Result;
use crate::transcode::{TranscodeOutcome, Transcoder};
use crate::upstream::{self, NotesBackend, ShareLease};

use std::sync::Arc;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Where a served resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceSource {
    Cache,
    Upstream { transcoded: bool },
}

#[derive(Debug, Clone)]
pub struct ServedResource {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source: ResourceSource,
}

/// Serves resources from the cache, filling it from upstream on a miss.
pub struct ResourceService {
    backend: Arc<dyn NotesBackend>,
    cache: ResourceCache,
    transcoder: Transcoder,
}

impl ResourceService {
    pub fn new(backend: Arc<dyn NotesBackend>, cache: ResourceCache) -> Self {
        Self {
            backend,
            cache,
            transcoder: Transcoder::default(),
        }
    }

    pub async fn serve(&self, resource_id: &str) -> Result<ServedResource> {
        upstream::validate_id("resource", resource_id)?;

        if let Some(hit) = self.cache.get(resource_id).await? {
            tracing::debug!(%resource_id, "resource cache hit");
            return Ok(ServedResource {
                bytes: hit.bytes,
                content_type: hit.content_type,
                source: ResourceSource::Cache,
            });
        }

        tracing::info!(%resource_id, "resource cache miss, fetching upstream");
        let note_id = self.backend.resource_owner(resource_id).await?;

        let lease = ShareLease::acquire(self.backend.clone(), &note_id).await?;
        let fetched = self
            .backend
            .fetch_shared_resource(lease.share(), resource_id)
            .await;
        lease.release().await;
        let fetched = fetched?;

        let content_type = fetched
            .content_type
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        let (bytes, content_type, transcoded) = if is_image(&content_type) {
            match self.transcoder.transcode_async(fetched.bytes).await {
                TranscodeOutcome::Transcoded { bytes, .. } => {
                    (bytes, "image/jpeg".to_string(), true)
                }
                TranscodeOutcome::PassedThrough { bytes, .. } => (bytes, content_type, false),
            }
        } else {
            (fetched.bytes, content_type, false)
        };

        self.cache
            .put(resource_id, &bytes, &content_type, transcoded)
            .await?;

        Ok(ServedResource {
            bytes,
            content_type,
            source: ResourceSource::Upstream { transcoded },
        })
    }
}

fn is_image(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
