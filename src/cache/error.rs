use std::path::PathBuf;

use crate::{engine, fsutil, runner};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lock(#[from] fsutil::FileLockError),
    #[error("failed to read cache file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache file `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache file `{path}`: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache file task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to resolve image `{reference}`: {source}")]
    Resolve {
        reference: String,
        #[source]
        source: engine::Error,
    },
    #[error("failed to probe image `{image}`: {source}")]
    Probe {
        image: String,
        #[source]
        source: runner::Error,
    },
}

impl Error {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Probe { source, .. } if source.is_interrupted())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
