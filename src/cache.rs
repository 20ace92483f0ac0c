//! Persistent classification of images as SUSE based, not SUSE based or outdated.
//!
//! Probing an image means starting a container, so verdicts are kept in a JSON
//! file shared by every invocation on the host. All writes go through an
//! exclusive file lock and merge with whatever other processes wrote since this
//! instance was loaded.
//!
//! When no candidate directory can hold the file the cache is invalid: every
//! lookup probes live and nothing is persisted.
mod error;
mod models;
mod probe;
mod store;

pub use error::{Error, Result};
pub use models::Classification;
pub use probe::{ImageProbe, LiveProbe};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::error::ResultOkLogExt;
use crate::fsutil;

/// Name of the cache file inside the chosen directory.
pub const CACHE_FILE_NAME: &str = "docker-zypper.json";

#[derive(Debug)]
pub struct ImageCache {
    /// `None` when no backing file could be acquired.
    path: Option<PathBuf>,
    state: Classification,
    dirty: bool,
}

impl ImageCache {
    /// Directories tried in order: `preferred`, the user cache directory, the temp directory.
    pub fn default_candidates(preferred: Option<PathBuf>) -> Vec<PathBuf> {
        preferred
            .into_iter()
            .chain(dirs::cache_dir())
            .chain(std::iter::once(std::env::temp_dir()))
            .collect()
    }

    /// Loads the cache from the first candidate directory whose cache file can be
    /// opened (or created) and locked.
    ///
    /// Never fails: without a usable directory the returned cache is invalid.
    pub fn load(candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        for dir in candidates {
            let path = dir.join(CACHE_FILE_NAME);
            let loaded = fsutil::open_locked(&path)
                .map_err(Error::from)
                .and_then(|mut locked| store::read(&mut locked));
            match loaded {
                Ok(state) => {
                    log::debug!("Using image cache `{}`", path.display());
                    return Self {
                        path: Some(path),
                        state,
                        dirty: false,
                    };
                }
                Err(err) => log::debug!("Cannot use cache directory `{}`: {}", dir.display(), err),
            }
        }

        log::warn!("No usable cache directory, images will be probed on every run");
        Self::disabled()
    }

    /// A cache without backing file.
    pub fn disabled() -> Self {
        Self {
            path: None,
            state: Classification::default(),
            dirty: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn suse_ids(&self) -> &BTreeSet<String> {
        &self.state.suse
    }

    pub fn other_ids(&self) -> &BTreeSet<String> {
        &self.state.other
    }

    pub fn outdated_ids(&self) -> &BTreeSet<String> {
        &self.state.outdated
    }

    /// Returns whether the image with the given id is SUSE based.
    ///
    /// Cached verdicts are answered without I/O. Otherwise `probe` decides and
    /// the verdict is recorded in memory; [`flush`](Self::flush) persists it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Probe`] if the probe could not reach a verdict. Nothing is
    /// recorded in that case.
    pub async fn classify<P: ImageProbe>(&mut self, id: &str, probe: &P) -> Result<bool> {
        if self.is_valid() {
            if let Some(suse) = self.state.verdict(id) {
                return Ok(suse);
            }
        }

        let suse = probe.is_suse(id).await.map_err(|source| Error::Probe {
            image: id.to_owned(),
            source,
        })?;
        if self.is_valid() && self.state.set_verdict(id, suse) {
            self.dirty = true;
        }

        Ok(suse)
    }

    pub fn is_outdated(&self, id: &str) -> bool {
        self.state.outdated.contains(id)
    }

    /// Marks the image `original` refers to as outdated and `new_id` as SUSE based.
    ///
    /// Each change is flushed on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] if `original` cannot be resolved to an image id,
    /// or the error of a failed flush.
    pub async fn record_update<E: Engine>(
        &mut self,
        engine: &E,
        original: &str,
        new_id: &str,
    ) -> Result<()> {
        let original_id = engine
            .inspect_image(original)
            .await
            .map_err(|source| Error::Resolve {
                reference: original.to_owned(),
                source,
            })?
            .id;
        if !self.is_valid() {
            return Ok(());
        }

        if self.state.outdated.insert(original_id) {
            self.dirty = true;
            self.flush().await?;
        }
        if self.state.set_verdict(new_id, true) {
            self.dirty = true;
            self.flush().await?;
        }

        Ok(())
    }

    /// Writes the cache to disk, merged with the current contents of the file.
    ///
    /// Does nothing for an invalid cache. The file lock is taken on the blocking
    /// thread pool, other processes may hold it for a while.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be locked, read or written.
    pub async fn flush(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        let state = self.state.clone();
        self.state = tokio::task::spawn_blocking(move || merge_into_file(&path, state)).await??;
        self.dirty = false;
        Ok(())
    }

    /// Forgets every SUSE / non-SUSE verdict, in memory and on disk.
    ///
    /// Outdated ids are kept: unlike the verdicts they cannot be probed again.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be locked, read or written.
    pub async fn reset(&mut self) -> Result<()> {
        self.state.suse.clear();
        self.state.other.clear();
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        let state = self.state.clone();
        self.state = tokio::task::spawn_blocking(move || reset_file(&path, state)).await??;
        self.dirty = false;
        Ok(())
    }
}

/// Locked read-merge-write of `state` into the file at `path`.
fn merge_into_file(path: &Path, mut state: Classification) -> Result<Classification> {
    let mut locked = fsutil::open_locked(path)?;
    let on_disk = store::read(&mut locked)?;
    state.merge(on_disk);
    store::write(&mut locked, &state)?;

    log::trace!("Flushed image cache `{}`", path.display());
    Ok(state)
}

/// Overwrites the verdicts on disk, keeping the outdated ids of both sides.
fn reset_file(path: &Path, mut state: Classification) -> Result<Classification> {
    let mut locked = fsutil::open_locked(path)?;
    let on_disk = store::read(&mut locked)?;
    state.outdated.extend(on_disk.outdated);
    store::write(&mut locked, &state)?;

    log::info!("Cleared image cache `{}`", path.display());
    Ok(state)
}

impl Drop for ImageCache {
    fn drop(&mut self) {
        if let (true, Some(path)) = (self.dirty, &self.path) {
            merge_into_file(path, std::mem::take(&mut self.state))
                .ok_log("failed to persist image cache");
        }
    }
}
