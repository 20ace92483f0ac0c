//! Runs a single command inside a transient container.
//!
//! [`ContainerRunner::run`] creates the container, starts it, optionally streams
//! its output and then races the container's exit against a timeout and the
//! process-wide [`Cancellation`]. Exactly one of success, command fault,
//! timeout or interruption is reported per run.
mod error;

pub use error::{Error, RunFailure, RunResult};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::container::ContainerID;
use crate::engine::{self, CreateSpec, Engine, TRANSIENT_LABEL};
use crate::error::ResultOkLogExt;
use crate::signal::Cancellation;

/// Timeout applied to runs that do not block until completion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Commands run as root, the package manager needs it.
const CONTAINER_USER: &str = "root";

/// Destination for the combined stdout/stderr of a container.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub timeout: Duration,
    /// `host:ip` overrides forwarded to every container.
    pub extra_hosts: Vec<String>,
    /// `(height, width)` the container TTY is resized to after start.
    pub tty_size: Option<(u16, u16)>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            extra_hosts: Vec::default(),
            tty_size: None,
        }
    }
}

/// Per-run options.
#[derive(Default)]
pub struct RunOptions {
    blocking: bool,
    output: Option<OutputSink>,
}

impl RunOptions {
    /// Wait for the container as long as it takes.
    pub fn blocking() -> Self {
        Self {
            blocking: true,
            output: None,
        }
    }

    /// Give up after the configured timeout.
    pub fn with_timeout() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.output = Some(sink);
        self
    }
}

enum Event {
    Cancelled,
    Exited(engine::Result<i64>),
    TimedOut,
}

#[derive(Debug)]
pub struct ContainerRunner<E> {
    engine: Arc<E>,
    cancellation: Cancellation,
    config: RunnerConfig,
}

impl<E> Clone for ContainerRunner<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            cancellation: self.cancellation.clone(),
            config: self.config.clone(),
        }
    }
}

impl<E: Engine> ContainerRunner<E> {
    pub fn new(engine: Arc<E>, cancellation: Cancellation, config: RunnerConfig) -> Self {
        Self {
            engine,
            cancellation,
            config,
        }
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Runs `command` through `/bin/sh -c` in a new container created from `image`.
    ///
    /// On success the container is left in place; the caller decides whether to
    /// commit it and must [`remove`](Self::remove) it afterwards. A failure
    /// carries the container id whenever a container still exists.
    ///
    /// # Errors
    ///
    /// * [`Error::Create`] / [`Error::InvalidContainerID`] if no container could be created.
    /// * [`Error::Start`] if the container could not be started.
    /// * [`Error::Wait`] if the engine failed while waiting for the exit.
    /// * [`Error::CommandFault`] if the command exited with a non-zero code.
    /// * [`Error::Timeout`] if a non-blocking run did not finish in time.
    /// * [`Error::Interrupted`] if the process was asked to terminate; the
    ///   container has already been killed and removed in that case.
    pub async fn run(&self, image: &str, command: &str, options: RunOptions) -> RunResult {
        let spec = CreateSpec {
            image: image.to_owned(),
            command: command.to_owned(),
            user: CONTAINER_USER.to_owned(),
            // zypper rewrites the terminal while refreshing and produces garbage without one.
            tty: true,
            extra_hosts: self.config.extra_hosts.clone(),
            labels: HashMap::from([(TRANSIENT_LABEL.to_owned(), "true".to_owned())]),
        };

        log::debug!("Creating container from `{image}` to run `{command}`");
        let id = self
            .engine
            .create_container(&spec)
            .await
            .map_err(|err| RunFailure::new(None, Error::Create(err)))?;
        let id = ContainerID::new(id).map_err(|err| RunFailure::new(None, err.into()))?;

        if let Err(err) = self.engine.start_container(id.as_ref()).await {
            return Err(RunFailure::new(Some(id), Error::Start(err)));
        }
        log::debug!("Started container `{}`", id.short());

        if let Some((height, width)) = self.config.tty_size {
            self.engine
                .resize_container(id.as_ref(), height, width)
                .await
                .ok_log("failed to resize container tty");
        }

        let mut drain = options.output.map(|sink| {
            tokio::spawn(copy_output(
                self.engine.container_output(id.as_ref()),
                sink,
            ))
        });

        let timeout = self.config.timeout;
        let blocking = options.blocking;
        let deadline = async move {
            if blocking {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(timeout).await;
            }
        };

        let event = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Event::Cancelled,
            status = self.engine.wait_container(id.as_ref()) => Event::Exited(status),
            _ = deadline => Event::TimedOut,
        };

        let code = match event {
            Event::Cancelled => {
                abort(drain);
                self.interrupt(&id).await;
                return Err(RunFailure::new(None, Error::Interrupted));
            }
            Event::TimedOut => {
                abort(drain);
                log::warn!(
                    "Container `{}` did not finish within {}s",
                    id.short(),
                    timeout.as_secs()
                );
                return Err(RunFailure::new(Some(id), Error::Timeout(timeout)));
            }
            Event::Exited(Err(err)) => {
                abort(drain);
                return Err(RunFailure::new(Some(id), Error::Wait(err)));
            }
            Event::Exited(Ok(code)) => code,
        };

        // The output has to be fully written before the exit code is acted upon.
        if let Some(handle) = drain.as_mut() {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    handle.abort();
                    self.interrupt(&id).await;
                    return Err(RunFailure::new(None, Error::Interrupted));
                }
                joined = &mut *handle => {
                    if let Err(err) = joined {
                        log::warn!("output streaming task failed: {err}");
                    }
                }
            }
        }

        log::debug!("Container `{}` exited with code {code}", id.short());
        if code == 0 {
            Ok(id)
        } else {
            Err(RunFailure::new(Some(id), Error::CommandFault { code }))
        }
    }

    /// Removes the container. Failures are logged and otherwise ignored.
    pub async fn remove(&self, id: &ContainerID) {
        if self
            .engine
            .remove_container(id.as_ref())
            .await
            .ok_log(&format!("failed to remove container `{}`", id.short()))
            .is_some()
        {
            log::debug!("Removed container `{}`", id.short());
        }
    }

    async fn interrupt(&self, id: &ContainerID) {
        log::info!("Killing container `{}`", id.short());
        self.engine
            .kill_container(id.as_ref())
            .await
            .ok_log(&format!("failed to kill container `{}`", id.short()));
        self.remove(id).await;
    }
}

fn abort(drain: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = drain {
        handle.abort();
    }
}

async fn copy_output(
    mut output: BoxStream<'static, engine::Result<Vec<u8>>>,
    mut sink: OutputSink,
) {
    while let Some(chunk) = output.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                log::warn!("failed to read container output: {err}");
                break;
            }
        };
        if let Err(err) = sink.write_all(&chunk).await {
            log::warn!("failed to write container output: {err}");
            return;
        }
    }
    sink.flush().await.ok_log("failed to flush container output");
}

#[cfg(test)]
pub(crate) mod tests {
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use std::time::Instant;

    use super::*;
    use crate::engine::mock::{Call, MockEngine};

    /// An [`AsyncWrite`] collecting everything into a shared buffer.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl AsyncWrite for SharedBuf {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn runner(engine: &Arc<MockEngine>, config: RunnerConfig) -> ContainerRunner<MockEngine> {
        ContainerRunner::new(Arc::clone(engine), Cancellation::new(), config)
    }

    #[tokio::test]
    async fn test_run_streams_output_and_keeps_container() {
        let engine = Arc::new(MockEngine {
            output: vec![b"Loading repository data...\n".to_vec(), b"done\n".to_vec()],
            ..Default::default()
        });
        let buf = SharedBuf::default();
        let id = runner(&engine, RunnerConfig::default())
            .run(
                "opensuse/leap",
                "zypper lu",
                RunOptions::blocking().with_output(Box::new(buf.clone())),
            )
            .await
            .expect("run should succeed");

        assert_eq!(id.as_ref(), "ctr-0");
        assert_eq!(buf.contents(), "Loading repository data...\ndone\n");
        assert_eq!(engine.count(|c| matches!(c, Call::Remove(_))), 0);
        assert_eq!(engine.count(|c| matches!(c, Call::Kill(_))), 0);
    }

    #[tokio::test]
    async fn test_create_spec() {
        let engine = Arc::new(MockEngine::default());
        let config = RunnerConfig {
            extra_hosts: vec!["registry.local:10.0.0.2".to_owned()],
            ..Default::default()
        };
        runner(&engine, config)
            .run("opensuse/leap", "zypper --version", RunOptions::with_timeout())
            .await
            .unwrap();

        let created = engine.created.lock().unwrap();
        let spec = created.get("ctr-0").unwrap();
        assert_eq!(spec.user, "root");
        assert!(spec.tty);
        assert_eq!(spec.command, "zypper --version");
        assert_eq!(spec.extra_hosts, vec!["registry.local:10.0.0.2".to_owned()]);
        assert_eq!(spec.labels.get(TRANSIENT_LABEL).map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_create_failure_touches_nothing_else() {
        let engine = Arc::new(MockEngine {
            fail_create: true,
            ..Default::default()
        });
        let failure = runner(&engine, RunnerConfig::default())
            .run("missing", "true", RunOptions::blocking())
            .await
            .unwrap_err();

        assert!(failure.container_id.is_none());
        assert!(matches!(failure.error, Error::Create(_)));
        assert_eq!(engine.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_container_id_is_rejected() {
        let engine = Arc::new(MockEngine {
            create_id: Some(String::new()),
            ..Default::default()
        });
        let failure = runner(&engine, RunnerConfig::default())
            .run("opensuse/leap", "true", RunOptions::blocking())
            .await
            .unwrap_err();

        assert!(failure.container_id.is_none());
        assert!(matches!(failure.error, Error::InvalidContainerID(_)));
        assert_eq!(
            engine.count(|c| matches!(c, Call::Start(_) | Call::Remove(_))),
            0
        );
    }

    #[tokio::test]
    async fn test_start_failure_returns_container() {
        let engine = Arc::new(MockEngine {
            fail_start: true,
            ..Default::default()
        });
        let failure = runner(&engine, RunnerConfig::default())
            .run("opensuse/leap", "true", RunOptions::blocking())
            .await
            .unwrap_err();

        assert_eq!(failure.container_id.unwrap().as_ref(), "ctr-0");
        assert!(matches!(failure.error, Error::Start(_)));
        assert_eq!(failure.error.exit_code(), None);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_command_fault() {
        let engine = Arc::new(MockEngine {
            default_exit: 100,
            ..Default::default()
        });
        let failure = runner(&engine, RunnerConfig::default())
            .run("opensuse/leap", "zypper lu", RunOptions::blocking())
            .await
            .unwrap_err();

        assert!(failure.container_id.is_some());
        assert_eq!(failure.error.exit_code(), Some(100));
    }

    #[tokio::test]
    async fn test_wait_failure_is_not_a_command_fault() {
        let engine = Arc::new(MockEngine {
            fail_wait: true,
            ..Default::default()
        });
        let failure = runner(&engine, RunnerConfig::default())
            .run("opensuse/leap", "zypper lu", RunOptions::blocking())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, Error::Wait(_)));
        assert_eq!(failure.error.exit_code(), None);
        assert_eq!(failure.container_id.unwrap().as_ref(), "ctr-0");
        assert_eq!(engine.count(|c| matches!(c, Call::Remove(_) | Call::Kill(_))), 0);
    }

    #[tokio::test]
    async fn test_timeout_does_not_hang() {
        let engine = Arc::new(MockEngine {
            hang: true,
            ..Default::default()
        });
        let config = RunnerConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let started = Instant::now();
        let failure = runner(&engine, config)
            .run("opensuse/leap", "sleep 100", RunOptions::with_timeout())
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(failure.error, Error::Timeout(_)));
        assert!(failure.container_id.is_some());
        assert_eq!(engine.count(|c| matches!(c, Call::Kill(_))), 0);
    }

    #[tokio::test]
    async fn test_cancellation_kills_and_removes() {
        let engine = Arc::new(MockEngine {
            hang: true,
            fail_kill: true,
            ..Default::default()
        });
        let runner = runner(&engine, RunnerConfig::default());
        let cancellation = runner.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancellation.cancel();
        });

        let failure = runner
            .run("opensuse/leap", "zypper up", RunOptions::blocking())
            .await
            .unwrap_err();

        assert!(failure.error.is_interrupted());
        assert!(failure.container_id.is_none());
        let calls = engine.calls();
        let kill = calls.iter().position(|c| *c == Call::Kill("ctr-0".into()));
        let remove = calls.iter().position(|c| *c == Call::Remove("ctr-0".into()));
        assert!(kill.is_some());
        assert!(remove > kill);
    }

    #[tokio::test]
    async fn test_remove_failure_is_only_logged() {
        let engine = Arc::new(MockEngine {
            fail_remove: true,
            ..Default::default()
        });
        let runner = runner(&engine, RunnerConfig::default());
        runner.remove(&ContainerID::new("ctr-9").unwrap()).await;
        assert_eq!(engine.calls(), vec![Call::Remove("ctr-9".into())]);
    }

    #[tokio::test]
    async fn test_tty_resize() {
        let engine = Arc::new(MockEngine::default());
        let config = RunnerConfig {
            tty_size: Some((24, 80)),
            ..Default::default()
        };
        runner(&engine, config)
            .run("opensuse/leap", "true", RunOptions::blocking())
            .await
            .unwrap();
        assert_eq!(engine.count(|c| matches!(c, Call::Resize(_))), 1);
    }
}
