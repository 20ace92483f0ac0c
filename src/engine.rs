//! The container engine seam.
//!
//! Everything that talks to the container engine goes through [`Engine`], so the
//! runner, the update workflow and the inspector can be driven by the real
//! Docker daemon ([`DockerEngine`]) or by a scripted engine in tests.
mod docker;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod models;

pub use docker::DockerEngine;
pub use error::{Error, Result};
pub use models::{CommitSpec, CreateSpec, ImageDetails, RunningContainer, TRANSIENT_LABEL};

use std::future::Future;

use futures::stream::BoxStream;

/// Container engine operations consumed by this crate.
pub trait Engine: Send + Sync {
    /// Creates a container and returns the engine-assigned id.
    fn create_container(&self, spec: &CreateSpec) -> impl Future<Output = Result<String>> + Send;

    fn start_container(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Blocks until the container's process exits and returns its exit code.
    ///
    /// A non-zero exit code is not an error.
    fn wait_container(&self, id: &str) -> impl Future<Output = Result<i64>> + Send;

    /// Streams the combined output of the container until it is closed by the engine.
    fn container_output(&self, id: &str) -> BoxStream<'static, Result<Vec<u8>>>;

    fn kill_container(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Forcefully removes the container.
    fn remove_container(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn resize_container(
        &self,
        id: &str,
        height: u16,
        width: u16,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Lists the running containers.
    fn list_containers(&self) -> impl Future<Output = Result<Vec<RunningContainer>>> + Send;

    /// Returns the `repository:tag` names of the images matching `reference`.
    fn list_image_tags(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn inspect_image(&self, reference: &str) -> impl Future<Output = Result<ImageDetails>> + Send;

    /// Commits the container to a new image and returns the image id.
    fn commit_container(&self, spec: &CommitSpec) -> impl Future<Output = Result<String>> + Send;
}
