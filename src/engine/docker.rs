use std::collections::HashMap;

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, ResizeContainerTtyOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::image::{CommitContainerOptions, ListImagesOptions};
use bollard::models::HostConfig;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use super::error::api;
use super::{CommitSpec, CreateSpec, Engine, Error, ImageDetails, Result, RunningContainer};

/// [`Engine`] backed by the Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects using the local defaults (`DOCKER_HOST` or the default socket)
    /// and verifies the daemon answers.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(Error::Connect)?;
        let version = docker.ping().await.map_err(Error::Connect)?;
        log::debug!("Connected to docker daemon ({version})");

        Ok(Self { docker })
    }
}

impl Engine for DockerEngine {
    async fn create_container(&self, spec: &CreateSpec) -> Result<String> {
        let config = Config {
            image: Some(spec.image.clone()),
            entrypoint: Some(
                CreateSpec::ENTRYPOINT
                    .iter()
                    .map(|part| part.to_string())
                    .collect(),
            ),
            cmd: Some(vec![spec.command.clone()]),
            user: Some(spec.user.clone()),
            tty: Some(spec.tty),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            labels: Some(spec.labels.clone()),
            host_config: Some(HostConfig {
                extra_hosts: Some(spec.extra_hosts.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(api("create"))?;
        for warning in &response.warnings {
            log::warn!("docker: {warning}");
        }

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(api("start"))
    }

    async fn wait_container(&self, id: &str) -> Result<i64> {
        let mut stream = Box::pin(
            self.docker
                .wait_container(id, None::<WaitContainerOptions<String>>),
        );
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit status as an error.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(source)) => Err(Error::Api { op: "wait", source }),
            None => Err(Error::Unexpected {
                op: "wait",
                message: format!("no exit status for container `{id}`"),
            }),
        }
    }

    fn container_output(&self, id: &str) -> BoxStream<'static, Result<Vec<u8>>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_owned(),
            ..Default::default()
        };
        self.docker
            .logs(id, Some(options))
            .map_ok(|output| match output {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::StdIn { message }
                | LogOutput::Console { message } => message.to_vec(),
            })
            .map_err(api("logs"))
            .boxed()
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        self.docker
            .kill_container(id, Some(KillContainerOptions { signal: "SIGKILL" }))
            .await
            .map_err(api("kill"))
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(api("remove"))
    }

    async fn resize_container(&self, id: &str, height: u16, width: u16) -> Result<()> {
        self.docker
            .resize_container_tty(id, ResizeContainerTtyOptions { height, width })
            .await
            .map_err(api("resize"))
    }

    async fn list_containers(&self) -> Result<Vec<RunningContainer>> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(api("list containers"))?;

        Ok(containers
            .into_iter()
            .map(|summary| RunningContainer {
                id: summary.id.unwrap_or_default(),
                name: summary
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|name| name.trim_start_matches('/').to_owned())
                    .unwrap_or_default(),
                image: summary.image.unwrap_or_default(),
                labels: summary.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_image_tags(&self, reference: &str) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_owned(), vec![reference.to_owned()]);
        let options = ListImagesOptions {
            all: false,
            filters,
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(api("list images"))?;

        Ok(images
            .into_iter()
            .flat_map(|image| image.repo_tags)
            .collect())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageDetails> {
        let image = self
            .docker
            .inspect_image(reference)
            .await
            .map_err(api("inspect image"))?;
        let id = image.id.ok_or_else(|| Error::Unexpected {
            op: "inspect image",
            message: format!("image `{reference}` has no id"),
        })?;
        let config = image.config.unwrap_or_default();

        Ok(ImageDetails {
            id,
            user: config.user.unwrap_or_default(),
            entrypoint: config.entrypoint.unwrap_or_default(),
            cmd: config.cmd.unwrap_or_default(),
        })
    }

    async fn commit_container(&self, spec: &CommitSpec) -> Result<String> {
        let options = CommitContainerOptions {
            container: spec.container.clone(),
            repo: spec.repo.clone(),
            tag: spec.tag.clone(),
            comment: spec.comment.clone(),
            author: spec.author.clone(),
            pause: true,
            changes: Some(spec.changes.join("\n")),
        };
        self.docker
            .commit_container(options, Config::<String>::default())
            .await
            .map_err(api("commit"))?;

        let committed = self
            .inspect_image(&format!("{}:{}", spec.repo, spec.tag))
            .await?;
        Ok(committed.id)
    }
}
