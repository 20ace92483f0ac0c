use std::time::Duration;

use crate::container::ContainerID;
use crate::{container, engine};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create container: {0}")]
    Create(#[source] engine::Error),
    #[error("engine returned an unusable container id: {0}")]
    InvalidContainerID(#[from] container::Error),
    #[error("failed to start container: {0}")]
    Start(#[source] engine::Error),
    #[error("failed to wait for container: {0}")]
    Wait(#[source] engine::Error),
    #[error("command exited with code {code}")]
    CommandFault { code: i64 },
    #[error("container did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// The exit code of the in-container command, if it ran to completion.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Error::CommandFault { code } => Some(*code),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

/// A failed run, together with the container that is left behind.
///
/// `container_id` is `None` when no container was created or when it was
/// already removed by the runner.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    pub container_id: Option<ContainerID>,
    pub error: Error,
}

impl RunFailure {
    pub(super) fn new(container_id: Option<ContainerID>, error: Error) -> Self {
        Self {
            container_id,
            error,
        }
    }
}

pub type RunResult = std::result::Result<ContainerID, RunFailure>;
