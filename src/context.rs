use std::sync::Arc;

use crate::cache::ImageCache;
use crate::config::Config;
use crate::driver::Driver;
use crate::engine::Engine;
use crate::runner::ContainerRunner;
use crate::signal::Cancellation;

/// Everything a command needs, created once per process.
///
/// Dropping the context flushes pending cache changes.
#[derive(Debug)]
pub struct Context<E> {
    pub engine: Arc<E>,
    pub runner: ContainerRunner<E>,
    pub cache: ImageCache,
    pub driver: Driver,
}

impl<E: Engine> Context<E> {
    pub fn new(
        engine: Arc<E>,
        cache: ImageCache,
        cancellation: Cancellation,
        config: &Config,
    ) -> Self {
        let runner = ContainerRunner::new(
            Arc::clone(&engine),
            cancellation,
            config.runner_config(),
        );
        Self {
            engine,
            runner,
            cache,
            driver: Driver::default(),
        }
    }

    pub fn cancellation(&self) -> &Cancellation {
        self.runner.cancellation()
    }
}
