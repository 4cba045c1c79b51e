use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::error::{ExtDataError, Result};

/// Exclusive advisory lock on a lock file, released on drop.
pub struct DirLock {
    file: File,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Block until `dir/name` is exclusively locked. Creates `dir` if needed.
pub fn lock_exclusive(dir: &Path, name: &str) -> Result<DirLock> {
    fs::create_dir_all(dir).map_err(|e| ExtDataError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let path = dir.join(name);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| ExtDataError::IoError {
            path: path.clone(),
            source: e,
        })?;

    file.lock_exclusive()
        .map_err(|e| ExtDataError::LockError(format!("{}: {}", path.display(), e)))?;
    Ok(DirLock { file })
}
