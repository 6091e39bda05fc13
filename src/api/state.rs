//! Shared state for the HTTP API.

use crate::cache::ResourceCache;
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::render::NoteRenderer;
use crate::resources::ResourceService;
use crate::upstream::NotesBackend;

use std::sync::Arc;

/// State shared across all API handlers.
pub struct ApiState {
    pub config: Arc<ProxyConfig>,
    pub backend: Arc<dyn NotesBackend>,
    pub renderer: NoteRenderer,
    pub resources: ResourceService,
}

impl ApiState {
    pub fn new(
        config: Arc<ProxyConfig>,
        backend: Arc<dyn NotesBackend>,
        cache: ResourceCache,
    ) -> Result<Self> {
        Ok(Self {
            renderer: NoteRenderer::new(&config)?,
            resources: ResourceService::new(backend.clone(), cache),
            config,
            backend,
        })
    }
}
