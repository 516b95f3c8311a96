use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

pub const UPLOADS_DIR: &str = "uploads";

pub fn uploads_dir(workspace: &Path) -> PathBuf {
    workspace.join(UPLOADS_DIR)
}

/// Copies an uploaded file into the workspace upload directory. The copy is
/// removed when the returned handle drops, on every exit path.
pub fn stage_upload(workspace: &Path, source: &Path, extension: &str) -> io::Result<NamedTempFile> {
    let dir = uploads_dir(workspace);
    std::fs::create_dir_all(&dir)?;
    let suffix = if extension.is_empty() {
        String::new()
    } else {
        format!(".{extension}")
    };
    let staged = Builder::new()
        .prefix("upload_")
        .suffix(&suffix)
        .tempfile_in(&dir)?;
    std::fs::copy(source, staged.path())?;
    Ok(staged)
}

/// Scratch file for a rendered hall ticket, deleted on drop.
pub fn hall_ticket_file(workspace: &Path, student_id: &str) -> io::Result<NamedTempFile> {
    let dir = uploads_dir(workspace);
    std::fs::create_dir_all(&dir)?;
    Builder::new()
        .prefix(&format!("hall_ticket_{student_id}_"))
        .suffix(".pdf")
        .tempfile_in(&dir)
}

/// Removes everything inside the upload directory, keeping the directory itself.
pub fn clear_uploads(workspace: &Path) -> io::Result<usize> {
    let dir = uploads_dir(workspace);
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for ent in std::fs::read_dir(&dir)? {
        let p = ent?.path();
        if p.is_dir() {
            std::fs::remove_dir_all(&p)?;
        } else {
            std::fs::remove_file(&p)?;
        }
        removed += 1;
    }
    Ok(removed)
}

pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default()
}
