use std::future::Future;

use crate::driver::Driver;
use crate::engine::Engine;
use crate::runner::{self, ContainerRunner, RunFailure, RunOptions};

/// Decides whether an image is SUSE based.
pub trait ImageProbe {
    fn is_suse(&self, image: &str) -> impl Future<Output = Result<bool, runner::Error>> + Send;
}

/// Runs the driver's probe command in a disposable container.
///
/// The image is SUSE based when the command succeeds and not SUSE based when
/// it exits with any non-zero code. Every other outcome is an error and leaves
/// the image unclassified.
pub struct LiveProbe<'a, E> {
    runner: &'a ContainerRunner<E>,
    driver: Driver,
}

impl<'a, E: Engine> LiveProbe<'a, E> {
    pub fn new(runner: &'a ContainerRunner<E>, driver: Driver) -> Self {
        Self { runner, driver }
    }
}

impl<E: Engine> ImageProbe for LiveProbe<'_, E> {
    async fn is_suse(&self, image: &str) -> Result<bool, runner::Error> {
        log::debug!("Probing image `{image}`");
        let outcome = self
            .runner
            .run(image, self.driver.probe_command(), RunOptions::with_timeout())
            .await;
        match outcome {
            Ok(id) => {
                self.runner.remove(&id).await;
                Ok(true)
            }
            Err(RunFailure {
                container_id,
                error,
            }) => {
                if let Some(id) = &container_id {
                    self.runner.remove(id).await;
                }
                match error {
                    runner::Error::CommandFault { code } => {
                        log::debug!("Probe of `{image}` exited with {code}");
                        Ok(false)
                    }
                    other => Err(other),
                }
            }
        }
    }
}
