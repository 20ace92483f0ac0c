//! Runtime configuration.
//!
//! Read from the environment first, command line flags are layered on top.
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::{DEFAULT_TIMEOUT, RunnerConfig};

pub const ENV_CACHE_DIR: &str = "ZYPPER_DOCKER_CACHE_DIR";
pub const ENV_TIMEOUT: &str = "ZYPPER_DOCKER_TIMEOUT";
pub const ENV_ADD_HOST: &str = "ZYPPER_DOCKER_ADD_HOST";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for `{name}`: expected a positive number of seconds")]
    InvalidTimeout { name: &'static str, value: String },
    #[error("invalid host mapping `{0}`: expected `host:ip`")]
    InvalidHost(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory tried first for the image cache.
    pub cache_dir: Option<PathBuf>,
    /// Timeout for runs that do not block until the container exits.
    pub timeout: Duration,
    /// `host:ip` mappings added to every container.
    pub extra_hosts: Vec<String>,
    /// `(height, width)` of the controlling terminal, if known.
    pub tty_size: Option<(u16, u16)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            timeout: DEFAULT_TIMEOUT,
            extra_hosts: Vec::default(),
            tty_size: None,
        }
    }
}

impl Config {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the variables holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config {
            cache_dir: lookup(ENV_CACHE_DIR)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            ..Default::default()
        };

        if let Some(value) = lookup(ENV_TIMEOUT) {
            config.timeout = match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(Error::InvalidTimeout {
                        name: ENV_TIMEOUT,
                        value,
                    });
                }
            };
        }

        if let Some(hosts) = lookup(ENV_ADD_HOST) {
            config.add_hosts(
                hosts
                    .split(',')
                    .map(str::trim)
                    .filter(|host| !host.is_empty())
                    .map(str::to_owned),
            )?;
        }

        let dimension = |name: &str| lookup(name).and_then(|value| value.trim().parse::<u16>().ok());
        config.tty_size = dimension("LINES").zip(dimension("COLUMNS"));

        Ok(config)
    }

    /// Appends `host:ip` mappings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHost`] for the first malformed mapping; nothing is
    /// added in that case.
    pub fn add_hosts(&mut self, hosts: impl IntoIterator<Item = String>) -> Result<()> {
        let hosts: Vec<String> = hosts.into_iter().collect();
        if let Some(invalid) = hosts.iter().find(|host| !is_valid_host_mapping(host)) {
            return Err(Error::InvalidHost(invalid.clone()));
        }
        self.extra_hosts.extend(hosts);
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            timeout: self.timeout,
            extra_hosts: self.extra_hosts.clone(),
            tty_size: self.tty_size,
        }
    }
}

fn is_valid_host_mapping(mapping: &str) -> bool {
    match mapping.split_once(':') {
        Some((host, ip)) => {
            !host.is_empty() && (ip == "host-gateway" || ip.parse::<IpAddr>().is_ok())
        }
        None => false,
    }
}
