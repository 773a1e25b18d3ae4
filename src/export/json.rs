//! JSON import/export for flashcard sets.
//! An exported set carries its cards; importing yields a draft for
//! [`crate::store::SetStore::add_set`].

use crate::models::{FlashcardSet, NewSet};
use log::info;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid set file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("set file has no title")]
    MissingTitle,
}

/// Writes a set and its cards to `path` as pretty-printed JSON.
pub fn export_set_to_path(set: &FlashcardSet, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let json_string = serde_json::to_string_pretty(set)?;
    let mut file = File::create(path.as_ref())?;
    file.write_all(json_string.as_bytes())?;
    info!("Set '{}' exported to '{}'", set.title, path.as_ref().display());
    Ok(())
}

/// Reads a set file. Accepts both exported sets (cards under
/// `flashcards`) and hand-written drafts (cards under `cards`).
/// Imported drafts are never placed in a folder.
pub fn import_set(path: impl AsRef<Path>) -> Result<NewSet, ExportError> {
    let mut file = File::open(path.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let mut draft: NewSet = serde_json::from_str(&contents)?;
    if draft.title.trim().is_empty() {
        return Err(ExportError::MissingTitle);
    }
    draft.folder_id = None;

    info!("Set '{}' imported from '{}'", draft.title, path.as_ref().display());
    Ok(draft)
}
