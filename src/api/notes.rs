//! GET /n/{note_id}: a note rendered as a standalone HTML page.

use super::state::ApiState;
use crate::error::Result;
use crate::notes;

use axum::extract::{Path, State};
use axum::response::Html;
use std::sync::Arc;

pub(super) async fn get_note(
    State(state): State<Arc<ApiState>>,
    Path(note_id): Path<String>,
) -> Result<Html<String>> {
    let note = notes::fetch_visible_note(
        state.backend.as_ref(),
        state.config.allowed_folders.as_ref(),
        &note_id,
    )
    .await?;

    let html = state.renderer.render_note(&note)?;
    tracing::debug!(%note_id, bytes = html.len(), "note rendered");
    Ok(Html(html))
}
