//! Text file I/O; writes go through a locked sibling temp file and a rename

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// `.<name>.<pid>.tmp` next to `path`, so the final rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Replace `path` with `content` in one step, creating parent directories.
///
/// Readers see either the old or the new file, never a partial one.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?
        }
        _ => {}
    }

    let staging = staging_path(path);
    let locked = || Error::LockFailed {
        path: path.to_path_buf(),
    };
    {
        let mut file = File::create(&staging).map_err(|e| Error::io(&staging, e))?;
        file.lock_exclusive().map_err(|_| locked())?;
        file.write_all(content)
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io(&staging, e))?;
        FileExt::unlock(&file).map_err(|_| locked())?;
    }
    fs::rename(&staging, path).map_err(|e| Error::io(path, e))?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Replaced file");
    Ok(())
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

pub fn write_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}
