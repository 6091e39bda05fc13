//! Note retrieval with folder-based visibility.

use crate::error::{Error, Result};
use crate::upstream::{self, Note, NotesBackend};

use std::collections::HashSet;

/// Fetch a note and apply the folder allowlist.
///
/// Folder membership is only known once the note has been fetched, so the
/// allowlist check always follows a successful upstream call. Malformed ids
/// are rejected before anything is sent upstream.
pub async fn fetch_visible_note(
    backend: &dyn NotesBackend,
    allowed_folders: Option<&HashSet<String>>,
    note_id: &str,
) -> Result<Note> {
    upstream::validate_id("note", note_id)?;
    let note = backend.get_note(note_id).await?;

    if let Some(folders) = allowed_folders {
        if !folders.contains(&note.parent_id) {
            tracing::info!(
                %note_id,
                parent_id = %note.parent_id,
                "note outside allowed folders"
            );
            return Err(Error::Forbidden("note not in allowed folder".to_string()));
        }
    }

    Ok(note)
}
