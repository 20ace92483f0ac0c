//! Running the package manager against an image.
//!
//! [`perform_update`] applies updates or patches in a transient container and
//! commits the result as a new image. [`list_updates`] only reports what would
//! be installed.
mod error;

pub use error::{Error, Result};

use crate::cache::LiveProbe;
use crate::container::ContainerID;
use crate::context::Context;
use crate::driver::Operation;
use crate::engine::{CommitSpec, Engine, ImageDetails};
use crate::error::ResultOkLogExt;
use crate::reference::ImageReference;
use crate::runner::{self, OutputSink, RunFailure, RunOptions};

/// User the committed image runs as when the source image does not set one.
const DEFAULT_USER: &str = "root";

/// State-changing operations whose result is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Every available package update.
    Update,
    /// Needed patches only.
    Patch,
}

impl UpdateKind {
    pub fn operation(self) -> Operation {
        match self {
            UpdateKind::Update => Operation::Update,
            UpdateKind::Patch => Operation::Patch,
        }
    }
}

/// Read-only operations run in a disposable container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Updates,
    Patches,
    PatchCheck,
}

impl ListKind {
    pub fn operation(self) -> Operation {
        match self {
            ListKind::Updates => Operation::ListUpdates,
            ListKind::Patches => Operation::ListPatches,
            ListKind::PatchCheck => Operation::CheckPatches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub kind: UpdateKind,
    /// Reference of the image to update.
    pub image: String,
    /// `repository[:tag]` the updated image is committed to.
    pub destination: String,
    pub comment: String,
    pub author: String,
}

/// Updates `request.image` and commits the result to `request.destination`.
///
/// Nothing is created when the destination is malformed or already exists.
/// A non-severe exit code of the package manager still leads to a commit. The
/// container is removed on every path once it exists.
///
/// # Errors
///
/// * [`Error::Reference`] / [`Error::ImageExists`] before any container is created.
/// * [`Error::Run`] if the container could not run or the exit code is severe.
/// * [`Error::Inspect`] / [`Error::Commit`] if the new image could not be committed.
/// * [`Error::CacheUpdate`] if the image was committed but the cache was not updated.
pub async fn perform_update<E: Engine>(
    ctx: &mut Context<E>,
    request: &UpdateRequest,
    output: Option<OutputSink>,
) -> Result<ImageReference> {
    let destination = ImageReference::parse(&request.destination)?;
    let target = destination.to_string();
    let existing = ctx
        .engine
        .list_image_tags(&target)
        .await
        .map_err(Error::ListImages)?;
    if existing
        .iter()
        .any(|tag| ImageReference::parse(tag).is_ok_and(|listed| listed == destination))
    {
        return Err(Error::ImageExists(target));
    }

    let operation = request.kind.operation();
    let command = ctx.driver.command(operation);
    log::info!("Running `{operation}` on `{}`", request.image);

    let id = match ctx
        .runner
        .run(&request.image, &command, run_options(output))
        .await
    {
        Ok(id) => id,
        Err(RunFailure {
            container_id: Some(id),
            error: runner::Error::CommandFault { code },
        }) if !ctx.driver.is_exit_code_severe(code) => {
            log::info!("`{operation}` exited with informational code {code}, committing anyway");
            id
        }
        Err(RunFailure {
            container_id,
            error,
        }) => {
            if let Some(id) = &container_id {
                ctx.runner.remove(id).await;
            }
            return Err(Error::Run {
                operation,
                image: request.image.clone(),
                source: error,
            });
        }
    };

    let committed = commit(ctx.engine.as_ref(), &id, request, &destination).await;
    ctx.runner.remove(&id).await;
    let new_id = committed?;
    log::info!("Committed `{target}` as {new_id}");

    ctx.cache
        .record_update(ctx.engine.as_ref(), &request.image, &new_id)
        .await
        .map_err(Error::CacheUpdate)?;

    Ok(destination)
}

/// Runs a read-only operation against `image` and returns the exit code of
/// the package manager: `0` or one of its informational codes.
///
/// # Errors
///
/// * [`Error::NotSuse`] if the image has no package manager to run.
/// * [`Error::Run`] if the container could not run or the exit code is severe.
pub async fn list_updates<E: Engine>(
    ctx: &mut Context<E>,
    kind: ListKind,
    image: &str,
    output: Option<OutputSink>,
) -> Result<i64> {
    let image_id = ctx
        .engine
        .inspect_image(image)
        .await
        .map_err(|source| Error::Inspect {
            image: image.to_owned(),
            source,
        })?
        .id;

    let probe = LiveProbe::new(&ctx.runner, ctx.driver);
    let suse = ctx
        .cache
        .classify(&image_id, &probe)
        .await
        .map_err(Error::Classify)?;
    ctx.cache.flush().await.ok_log("failed to persist image cache");
    if !suse {
        return Err(Error::NotSuse(image.to_owned()));
    }

    let operation = kind.operation();
    let command = ctx.driver.command(operation);
    match ctx.runner.run(image, &command, run_options(output)).await {
        Ok(id) => {
            ctx.runner.remove(&id).await;
            Ok(0)
        }
        Err(RunFailure {
            container_id,
            error,
        }) => {
            if let Some(id) = &container_id {
                ctx.runner.remove(id).await;
            }
            match error {
                runner::Error::CommandFault { code } if !ctx.driver.is_exit_code_severe(code) => {
                    Ok(code)
                }
                error => Err(Error::Run {
                    operation,
                    image: image.to_owned(),
                    source: error,
                }),
            }
        }
    }
}

fn run_options(output: Option<OutputSink>) -> RunOptions {
    match output {
        Some(sink) => RunOptions::blocking().with_output(sink),
        None => RunOptions::blocking(),
    }
}

/// Commits the container, restoring the configuration of the source image.
///
/// The container itself ran with a shell entrypoint, its own configuration
/// must not end up in the new image.
async fn commit<E: Engine>(
    engine: &E,
    container: &ContainerID,
    request: &UpdateRequest,
    destination: &ImageReference,
) -> Result<String> {
    let source = engine
        .inspect_image(&request.image)
        .await
        .map_err(|source| Error::Inspect {
            image: request.image.clone(),
            source,
        })?;

    let spec = CommitSpec {
        container: container.to_string(),
        repo: destination.repo().to_owned(),
        tag: destination.tag().to_owned(),
        comment: request.comment.clone(),
        author: request.author.clone(),
        changes: image_changes(&source)?,
    };
    engine
        .commit_container(&spec)
        .await
        .map_err(|source| Error::Commit {
            reference: destination.to_string(),
            source,
        })
}

fn image_changes(source: &ImageDetails) -> Result<Vec<String>> {
    let user = if source.user.is_empty() {
        DEFAULT_USER
    } else {
        source.user.as_str()
    };
    Ok(vec![
        format!("USER {user}"),
        format!("ENTRYPOINT {}", serde_json::to_string(&source.entrypoint)?),
        format!("CMD {}", serde_json::to_string(&source.cmd)?),
    ])
}
