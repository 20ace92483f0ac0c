//! Classification of the running containers for `ps`.
use std::fmt;

use crate::cache::LiveProbe;
use crate::context::Context;
use crate::engine::{self, Engine, RunningContainer};
use crate::error::ResultOkLogExt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list containers: {0}")]
    List(#[source] engine::Error),
    #[error("failed to resolve image `{image}` of container `{container}`: {source}")]
    Resolve {
        container: String,
        image: String,
        #[source]
        source: engine::Error,
    },
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A container together with the reason it could not be reported as updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flagged {
    pub container: RunningContainer,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainersState {
    /// Containers running an image that has since been updated.
    pub updated: Vec<RunningContainer>,
    /// Containers whose image is not SUSE based.
    pub ignored: Vec<Flagged>,
    pub unknown: Vec<Flagged>,
}

const NOT_SUSE: &str = "not a SUSE based image";
const NOT_OUTDATED: &str = "no updated image is known";

/// Classifies every running container by its image.
///
/// Returns `Ok(None)` when no containers are running. Containers created by
/// this tool are skipped.
///
/// # Errors
///
/// * [`Error::List`] if the running containers cannot be listed.
/// * [`Error::Resolve`] if an image cannot be resolved and `ignore_failures` is unset.
/// * [`Error::Interrupted`] if cancellation was requested before all containers
///   were classified.
pub async fn list_containers<E: Engine>(
    ctx: &mut Context<E>,
    ignore_failures: bool,
) -> Result<Option<ContainersState>> {
    let containers: Vec<RunningContainer> = ctx
        .engine
        .list_containers()
        .await
        .map_err(Error::List)?
        .into_iter()
        .filter(|container| !container.is_transient())
        .collect();
    if containers.is_empty() {
        return Ok(None);
    }

    let probe = LiveProbe::new(&ctx.runner, ctx.driver);
    let mut state = ContainersState::default();
    for container in containers {
        if ctx.runner.cancellation().is_cancelled() {
            return Err(Error::Interrupted);
        }

        let image_id = match ctx.engine.inspect_image(&container.image).await {
            Ok(details) => details.id,
            Err(err) if ignore_failures => {
                log::warn!(
                    "Skipping container `{}`: cannot resolve image `{}`: {err}",
                    container.name,
                    container.image
                );
                continue;
            }
            Err(source) => {
                return Err(Error::Resolve {
                    container: container.name,
                    image: container.image,
                    source,
                });
            }
        };

        match ctx.cache.classify(&image_id, &probe).await {
            Ok(false) => state.ignored.push(Flagged {
                container,
                reason: NOT_SUSE.to_owned(),
            }),
            Ok(true) if ctx.cache.is_outdated(&image_id) => state.updated.push(container),
            Ok(true) => state.unknown.push(Flagged {
                container,
                reason: NOT_OUTDATED.to_owned(),
            }),
            Err(err) if err.is_interrupted() => return Err(Error::Interrupted),
            Err(err) => state.unknown.push(Flagged {
                container,
                reason: err.to_string(),
            }),
        }
    }

    ctx.cache.flush().await.ok_log("failed to persist image cache");
    Ok(Some(state))
}

fn describe(container: &RunningContainer) -> String {
    let id = container.id.get(..12).unwrap_or(&container.id);
    format!("{id} [{}] using image {}", container.name, container.image)
}

impl fmt::Display for ContainersState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Running containers whose images have been updated:")?;
        for container in &self.updated {
            writeln!(f, "  - {}", describe(container))?;
        }
        writeln!(
            f,
            "\nRunning containers that zypper-docker does not handle:"
        )?;
        for flagged in &self.ignored {
            writeln!(f, "  - {}: {}", describe(&flagged.container), flagged.reason)?;
        }
        writeln!(f, "\nRunning containers in an unknown state:")?;
        for flagged in &self.unknown {
            writeln!(f, "  - {}: {}", describe(&flagged.container), flagged.reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CACHE_FILE_NAME, ImageCache};
    use crate::config::Config;
    use crate::engine::mock::{Call, MockEngine};
    use crate::engine::{ImageDetails, TRANSIENT_LABEL};
    use crate::signal::Cancellation;

    fn running(name: &str, image: &str) -> RunningContainer {
        RunningContainer {
            id: format!("{name}0123456789abcdef"),
            name: name.to_owned(),
            image: image.to_owned(),
            labels: HashMap::new(),
        }
    }

    fn image(id: &str) -> ImageDetails {
        ImageDetails {
            id: id.to_owned(),
            ..Default::default()
        }
    }

    fn context(engine: MockEngine, cache: ImageCache) -> (Arc<MockEngine>, Context<MockEngine>) {
        let engine = Arc::new(engine);
        let ctx = Context::new(
            Arc::clone(&engine),
            cache,
            Cancellation::new(),
            &Config::default(),
        );
        (engine, ctx)
    }

    fn names(containers: &[Flagged]) -> Vec<&str> {
        containers
            .iter()
            .map(|flagged| flagged.container.name.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_no_running_containers() {
        let (_, mut ctx) = context(MockEngine::default(), ImageCache::disabled());
        assert_eq!(list_containers(&mut ctx, false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_only_transient_containers() {
        let mut probe = running("probe", "opensuse/leap");
        probe
            .labels
            .insert(TRANSIENT_LABEL.to_owned(), "true".to_owned());
        let (_, mut ctx) = context(
            MockEngine {
                containers: vec![probe],
                ..Default::default()
            },
            ImageCache::disabled(),
        );
        assert_eq!(list_containers(&mut ctx, false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_classification() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CACHE_FILE_NAME),
            r#"{"suse":[],"other":[],"outdated":["sha256:leap-old"]}"#,
        )
        .unwrap();
        let (engine, mut ctx) = context(
            MockEngine {
                containers: vec![
                    running("web", "opensuse/leap:old"),
                    running("tools", "busybox"),
                    running("db", "opensuse/tumbleweed"),
                ],
                exit_codes: [("sha256:busybox".to_owned(), 127)].into(),
                ..Default::default()
            }
            .with_image("opensuse/leap:old", image("sha256:leap-old"))
            .with_image("busybox", image("sha256:busybox"))
            .with_image("opensuse/tumbleweed", image("sha256:tw")),
            ImageCache::load([tmp.path().to_path_buf()]),
        );

        let state = list_containers(&mut ctx, false).await.unwrap().unwrap();

        assert_eq!(state.updated.len(), 1);
        assert_eq!(state.updated[0].name, "web");
        assert_eq!(names(&state.ignored), vec!["tools"]);
        assert_eq!(state.ignored[0].reason, NOT_SUSE);
        assert_eq!(names(&state.unknown), vec!["db"]);
        assert_eq!(state.unknown[0].reason, NOT_OUTDATED);
        assert_eq!(engine.count(|c| matches!(c, Call::Create { .. })), 3);

        // Verdicts are persisted once the listing is done.
        let raw = std::fs::read_to_string(tmp.path().join(CACHE_FILE_NAME)).unwrap();
        assert!(raw.contains("sha256:busybox"));
        assert!(raw.contains("sha256:tw"));
    }

    #[tokio::test]
    async fn test_resolve_failure() {
        let engine = || MockEngine {
            containers: vec![running("orphan", "gone"), running("web", "opensuse/leap")],
            ..Default::default()
        }
        .with_image("opensuse/leap", image("sha256:leap"));

        let (_, mut ctx) = context(engine(), ImageCache::disabled());
        let err = list_containers(&mut ctx, false).await.unwrap_err();
        assert!(matches!(err, Error::Resolve { ref container, .. } if container == "orphan"));

        let (_, mut ctx) = context(engine(), ImageCache::disabled());
        let state = list_containers(&mut ctx, true).await.unwrap().unwrap();
        assert_eq!(names(&state.unknown), vec!["web"]);
        assert!(state.ignored.is_empty());
    }

    #[tokio::test]
    async fn test_probe_failure_is_unknown() {
        let (_, mut ctx) = context(
            MockEngine {
                containers: vec![running("web", "opensuse/leap")],
                fail_start: true,
                ..Default::default()
            }
            .with_image("opensuse/leap", image("sha256:leap")),
            ImageCache::disabled(),
        );

        let state = list_containers(&mut ctx, false).await.unwrap().unwrap();
        assert_eq!(names(&state.unknown), vec!["web"]);
        assert!(state.unknown[0].reason.contains("failed to start container"));
    }

    #[tokio::test]
    async fn test_cancelled_before_classification() {
        let (engine, mut ctx) = context(
            MockEngine {
                containers: vec![running("web", "opensuse/leap")],
                ..Default::default()
            }
            .with_image("opensuse/leap", image("sha256:leap")),
            ImageCache::disabled(),
        );
        ctx.cancellation().cancel();

        let err = list_containers(&mut ctx, false).await.unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(engine.count(|c| matches!(c, Call::Inspect(_))), 0);
    }

    #[test]
    fn test_display() {
        let state = ContainersState {
            updated: vec![running("web", "opensuse/leap")],
            ignored: vec![Flagged {
                container: running("tools", "busybox"),
                reason: NOT_SUSE.to_owned(),
            }],
            unknown: Vec::new(),
        };
        let out = state.to_string();
        assert!(out.contains("  - web012345678 [web] using image opensuse/leap\n"));
        assert!(out.contains("  - tools0123456 [tools] using image busybox: not a SUSE based image\n"));
        assert!(out.ends_with("unknown state:\n"));
    }
}
