use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Error that occurs when opening or locking a file fails.
#[derive(Debug, thiserror::Error)]
pub enum FileLockError {
    #[error("failed to open file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to lock file `{path}`: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An open file holding an exclusive advisory lock.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            log::warn!("failed to unlock `{}`: {}", self.path.display(), err);
        }
    }
}

/// Opens the file at `path` for reading and writing, creating it (and its parent
/// directories) if needed, and blocks until an exclusive lock is held.
///
/// The file is never truncated here.
///
/// # Errors
///
/// Returns a [`FileLockError`] if the directories or the file cannot be created or
/// opened, or if locking fails.
///
/// # Example
/// ```no_run
/// # use zypper_docker::fsutil;
/// let mut locked = fsutil::open_locked("/tmp/some/file.json")?;
/// let _len = locked.file().metadata().map(|m| m.len());
/// # Ok::<(), fsutil::FileLockError>(())
/// ```
pub fn open_locked(path: impl AsRef<Path>) -> Result<LockedFile, FileLockError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| FileLockError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| FileLockError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    FileExt::lock_exclusive(&file).map_err(|source| FileLockError::Lock {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(LockedFile {
        file,
        path: path.to_path_buf(),
    })
}
