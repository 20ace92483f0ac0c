use crate::driver::Operation;
use crate::{cache, engine, reference, runner};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid destination image: {0}")]
    Reference(#[from] reference::Error),
    #[error("image `{0}` already exists, refusing to overwrite it")]
    ImageExists(String),
    #[error("failed to list images: {0}")]
    ListImages(#[source] engine::Error),
    #[error("`{operation}` failed on `{image}`: {source}")]
    Run {
        operation: Operation,
        image: String,
        #[source]
        source: runner::Error,
    },
    #[error("failed to inspect image `{image}`: {source}")]
    Inspect {
        image: String,
        #[source]
        source: engine::Error,
    },
    #[error("failed to encode image configuration: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to commit `{reference}`: {source}")]
    Commit {
        reference: String,
        #[source]
        source: engine::Error,
    },
    /// The new image exists but the cache does not know about it.
    #[error("image committed but the cache could not be updated: {0}")]
    CacheUpdate(#[source] cache::Error),
    #[error("`{0}` is not a SUSE based image")]
    NotSuse(String),
    #[error(transparent)]
    Classify(cache::Error),
}

impl Error {
    pub fn is_interrupted(&self) -> bool {
        match self {
            Error::Run { source, .. } => source.is_interrupted(),
            Error::Classify(err) => err.is_interrupted(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
