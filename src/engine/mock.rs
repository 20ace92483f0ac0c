//! A scripted [`Engine`] recording every call it receives.
use std::collections::HashMap;
use std::sync::Mutex;

use futures::StreamExt;
use futures::stream::BoxStream;

use super::{CommitSpec, CreateSpec, Engine, Error, ImageDetails, Result, RunningContainer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create { image: String, command: String },
    Start(String),
    Wait(String),
    Output(String),
    Kill(String),
    Remove(String),
    Resize(String),
    ListContainers,
    ListImageTags(String),
    Inspect(String),
    Commit(CommitSpec),
}

fn rejected(op: &'static str) -> Error {
    Error::Unexpected {
        op,
        message: "scripted failure".to_owned(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockEngine {
    pub calls: Mutex<Vec<Call>>,
    pub created: Mutex<HashMap<String, CreateSpec>>,
    pub fail_create: bool,
    /// Id returned by a successful create instead of `ctr-<n>`.
    pub create_id: Option<String>,
    pub fail_start: bool,
    pub fail_wait: bool,
    pub fail_kill: bool,
    pub fail_remove: bool,
    pub fail_commit: bool,
    /// Exit code per image; images without an entry exit with `default_exit`.
    pub exit_codes: HashMap<String, i64>,
    pub default_exit: i64,
    /// When set, waiting never completes.
    pub hang: bool,
    pub output: Vec<Vec<u8>>,
    pub images: HashMap<String, ImageDetails>,
    pub tags: Vec<String>,
    pub containers: Vec<RunningContainer>,
}

impl MockEngine {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    pub fn with_image(mut self, reference: &str, details: ImageDetails) -> Self {
        self.images.insert(reference.to_owned(), details);
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Engine for MockEngine {
    async fn create_container(&self, spec: &CreateSpec) -> Result<String> {
        self.record(Call::Create {
            image: spec.image.clone(),
            command: spec.command.clone(),
        });
        if self.fail_create {
            return Err(rejected("create"));
        }
        let mut created = self.created.lock().unwrap();
        let id = self
            .create_id
            .clone()
            .unwrap_or_else(|| format!("ctr-{}", created.len()));
        created.insert(id.clone(), spec.clone());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(Call::Start(id.to_owned()));
        if self.fail_start {
            return Err(rejected("start"));
        }
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64> {
        self.record(Call::Wait(id.to_owned()));
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail_wait {
            return Err(rejected("wait"));
        }
        let image = self
            .created
            .lock()
            .unwrap()
            .get(id)
            .map(|spec| spec.image.clone())
            .unwrap_or_default();
        Ok(self
            .exit_codes
            .get(&image)
            .copied()
            .unwrap_or(self.default_exit))
    }

    fn container_output(&self, id: &str) -> BoxStream<'static, Result<Vec<u8>>> {
        self.record(Call::Output(id.to_owned()));
        futures::stream::iter(self.output.clone().into_iter().map(Ok)).boxed()
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        self.record(Call::Kill(id.to_owned()));
        if self.fail_kill {
            return Err(rejected("kill"));
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(Call::Remove(id.to_owned()));
        if self.fail_remove {
            return Err(rejected("remove"));
        }
        Ok(())
    }

    async fn resize_container(&self, id: &str, _height: u16, _width: u16) -> Result<()> {
        self.record(Call::Resize(id.to_owned()));
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<RunningContainer>> {
        self.record(Call::ListContainers);
        Ok(self.containers.clone())
    }

    async fn list_image_tags(&self, reference: &str) -> Result<Vec<String>> {
        self.record(Call::ListImageTags(reference.to_owned()));
        Ok(self
            .tags
            .iter()
            .filter(|tag| tag.as_str() == reference)
            .cloned()
            .collect())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails> {
        self.record(Call::Inspect(reference.to_owned()));
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| rejected("inspect image"))
    }

    async fn commit_container(&self, spec: &CommitSpec) -> Result<String> {
        self.record(Call::Commit(spec.clone()));
        if self.fail_commit {
            return Err(rejected("commit"));
        }
        Ok(format!("sha256:committed-{}", spec.tag))
    }
}
