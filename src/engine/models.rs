use std::collections::HashMap;

/// Label attached to every container this tool creates.
pub const TRANSIENT_LABEL: &str = "org.opensuse.zypper-docker.transient";

/// Parameters for creating a container that runs `command` through `/bin/sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    pub image: String,
    pub command: String,
    pub user: String,
    pub tty: bool,
    /// `host:ip` mappings written to the container's `/etc/hosts`.
    pub extra_hosts: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl CreateSpec {
    pub const ENTRYPOINT: [&'static str; 2] = ["/bin/sh", "-c"];
}

/// Parameters for committing a container to `repo:tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSpec {
    pub container: String,
    pub repo: String,
    pub tag: String,
    pub comment: String,
    pub author: String,
    /// Dockerfile instructions applied to the new image, e.g. `USER root`.
    pub changes: Vec<String>,
}

/// The parts of an image's metadata this crate cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub id: String,
    pub user: String,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningContainer {
    pub id: String,
    pub name: String,
    /// The image reference the container was started from.
    pub image: String,
    pub labels: HashMap<String, String>,
}

impl RunningContainer {
    pub fn is_transient(&self) -> bool {
        self.labels.contains_key(TRANSIENT_LABEL)
    }
}
