use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::subject::Category;
use crate::email::{ExtractError, MessagePart};

pub const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

/// Save a delivery note or exchange credit attachment.
///
/// Returns `Ok(None)` when the category or the part does not qualify; only
/// `application/octet-stream` parts with an `attachment` disposition and a
/// filename are written. An existing file with the same name is replaced.
pub fn extract(
    part: &MessagePart,
    category: Category,
    output_dir: &Path,
) -> Result<Option<PathBuf>, ExtractError> {
    if !category.saves_attachments() {
        return Ok(None);
    }

    debug!(
        "Content type: {}, Disposition: {}",
        part.content_type, part.content_disposition
    );

    if part.content_type != ATTACHMENT_CONTENT_TYPE || !part.content_disposition.contains("attachment") {
        return Ok(None);
    }

    let Some(filename) = part.filename.as_deref().and_then(safe_filename) else {
        return Ok(None);
    };

    let file_path = output_dir.join(filename);
    fs::write(&file_path, &part.payload).map_err(|source| ExtractError::AttachmentWriteFailure {
        path: file_path.clone(),
        source,
    })?;

    info!("📎 PDF saved: {:?} ({} bytes)", file_path, part.payload.len());
    Ok(Some(file_path))
}

// Keep only the last path component so a crafted name cannot leave output_dir
fn safe_filename(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}
