//! Disk-backed resource cache.
//!
//! Layout: one content file `<id>.bin` per resource plus a metadata record
//! `<id>.json` holding the content type, SHA-256 checksum and size. Entries
//! never expire. Both files are written to a temporary name and renamed into
//! place, record before content, so concurrent writers for the same id race
//! benignly: the last rename wins and readers never observe a partial file
//! or content without its record.
//!
//! A content file without a readable metadata record is a legacy entry and is
//! served as JPEG. A record that disagrees with its content file is a miss.

use crate::error::{Error, Result};
use crate::upstream::validate_id;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Content type assumed for entries written without metadata.
const LEGACY_CONTENT_TYPE: &str = "image/jpeg";

/// Metadata record stored next to each content file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    pub content_type: String,
    pub sha256: String,
    pub size: u64,
    pub transcoded: bool,
    pub cached_at: DateTime<Utc>,
}

/// A resource served from the cache.
#[derive(Debug, Clone)]
pub struct CachedResource {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Resource cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    dir: PathBuf,
}

impl ResourceCache {
    /// Open the cache, creating its directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::info!(path = %dir.display(), "resource cache ready");
        Ok(Self { dir })
    }

    #[cfg(test)]
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn content_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.bin"))
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Look up a resource. `Ok(None)` is a miss.
    pub async fn get(&self, id: &str) -> Result<Option<CachedResource>> {
        validate_id("resource", id)?;

        let bytes = match tokio::fs::read(self.content_path(id)).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let meta = match tokio::fs::read(self.meta_path(id)).await {
            Ok(raw) => serde_json::from_slice::<EntryMeta>(&raw).ok(),
            Err(error) if error.kind() == ErrorKind::NotFound => None,
            Err(error) => return Err(error.into()),
        };

        let Some(meta) = meta else {
            tracing::debug!(%id, "legacy cache entry without metadata");
            return Ok(Some(CachedResource {
                bytes,
                content_type: LEGACY_CONTENT_TYPE.to_string(),
            }));
        };

        if meta.size != bytes.len() as u64 || meta.sha256 != checksum(&bytes) {
            tracing::warn!(%id, "cache entry failed verification, treating as miss");
            return Ok(None);
        }

        Ok(Some(CachedResource {
            bytes,
            content_type: meta.content_type,
        }))
    }

    /// Store a resource and its metadata record.
    pub async fn put(
        &self,
        id: &str,
        bytes: &[u8],
        content_type: &str,
        transcoded: bool,
    ) -> Result<EntryMeta> {
        validate_id("resource", id)?;

        let meta = EntryMeta {
            content_type: content_type.to_string(),
            sha256: checksum(bytes),
            size: bytes.len() as u64,
            transcoded,
            cached_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| Error::Internal(anyhow::anyhow!("serialize cache metadata: {e}")))?;

        // Record first: a record without content is a miss, content without a
        // record would be taken for a legacy entry.
        self.write_atomic(&self.meta_path(id), &meta_json).await?;
        self.write_atomic(&self.content_path(id), bytes).await?;

        tracing::debug!(%id, size = meta.size, %content_type, transcoded, "resource cached");
        Ok(meta)
    }

    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        if let Err(error) = tokio::fs::write(&tmp, bytes).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(error);
        }
        tokio::fs::rename(&tmp, target).await
    }
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
