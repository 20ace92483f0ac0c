//! Parsing of the `repository[:tag]` references new images are committed to.
use std::fmt;
use std::str::FromStr;

/// The maximum length of the repository part of a reference.
const NAME_TOTAL_LENGTH_MAX: usize = 255;
/// The maximum length of a tag.
const TAG_MAX_LEN: usize = 128;
const DEFAULT_TAG: &str = "latest";
/// Registry names the engine drops when it lists images.
const DOCKER_HUB_DOMAINS: [&str; 2] = ["docker.io", "index.docker.io"];
const OFFICIAL_NAMESPACE: &str = "library/";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("image reference is empty")]
    Empty,
    #[error("repository name `{0}` must not exceed {NAME_TOTAL_LENGTH_MAX} characters")]
    NameTooLong(String),
    #[error("invalid repository name `{0}`")]
    InvalidName(String),
    #[error("invalid tag `{0}`")]
    InvalidTag(String),
    #[error("digest references cannot be used as commit targets: `{0}`")]
    Digest(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A validated `repository:tag` pair.
///
/// Docker Hub names are kept in the short form the engine lists images under,
/// so `docker.io/library/opensuse:15` and `opensuse:15` are equal.
///
/// # Examples
///
/// ```
/// # use zypper_docker::reference::ImageReference;
/// let reference: ImageReference = "registry.local:5000/opensuse/leap:15.6".parse().unwrap();
/// assert_eq!(reference.repo(), "registry.local:5000/opensuse/leap");
/// assert_eq!(reference.tag(), "15.6");
///
/// let reference: ImageReference = "opensuse/leap".parse().unwrap();
/// assert_eq!(reference.tag(), "latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repo: String,
    tag: String,
}

impl ImageReference {
    pub fn parse(src: &str) -> Result<Self> {
        if src.is_empty() {
            return Err(Error::Empty);
        }
        if src.contains('@') {
            return Err(Error::Digest(src.to_owned()));
        }

        // A colon after the last slash separates the tag, earlier ones belong to a registry port.
        let last_slash = src.rfind('/').map_or(0, |idx| idx + 1);
        let (repo, tag) = match src[last_slash..].rfind(':') {
            Some(idx) => {
                let idx = last_slash + idx;
                (&src[..idx], &src[idx + 1..])
            }
            None => (src, DEFAULT_TAG),
        };

        if repo.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(Error::NameTooLong(repo.to_owned()));
        }
        if !is_valid_name(repo) {
            return Err(Error::InvalidName(repo.to_owned()));
        }
        if !is_valid_tag(tag) {
            return Err(Error::InvalidTag(tag.to_owned()));
        }

        Ok(Self {
            repo: familiar_name(repo).to_owned(),
            tag: tag.to_owned(),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo, self.tag)
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut components: Vec<&str> = name.split('/').collect();
    if components.len() > 1 && is_domain_like(components[0]) {
        if !is_valid_domain(components[0]) {
            return false;
        }
        components.remove(0);
    }

    !components.is_empty() && components.into_iter().all(is_valid_path_component)
}

/// Shortens a Docker Hub name to the form the engine lists images under,
/// e.g. `docker.io/library/opensuse` to `opensuse`.
fn familiar_name(repo: &str) -> &str {
    let name = match repo.split_once('/') {
        Some((domain, rest)) if DOCKER_HUB_DOMAINS.contains(&domain) => rest,
        Some((domain, _)) if is_domain_like(domain) => return repo,
        _ => repo,
    };
    match name.strip_prefix(OFFICIAL_NAMESPACE) {
        Some(official) if !official.contains('/') => official,
        _ => name,
    }
}

fn is_domain_like(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn is_valid_domain(domain: &str) -> bool {
    let (host, port) = match domain.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };
    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }

    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

/// Path components are lowercase alphanumeric runs joined by `.`, `_`, `__` or
/// any number of `-`.
fn is_valid_path_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let is_alnum = |b: &u8| is_lowercase_alpha_numeric(std::slice::from_ref(b));
    if bytes.is_empty() || !is_alnum(&bytes[0]) || !is_alnum(&bytes[bytes.len() - 1]) {
        return false;
    }

    let mut separator = String::new();
    for b in bytes {
        if is_alnum(b) {
            if !separator.is_empty() && !is_valid_separator(&separator) {
                return false;
            }
            separator.clear();
        } else {
            separator.push(*b as char);
        }
    }

    true
}

fn is_valid_separator(separator: &str) -> bool {
    matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-')
}

fn is_valid_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    !bytes.is_empty()
        && bytes.len() <= TAG_MAX_LEN
        && is_word(bytes[0])
        && bytes[1..]
            .iter()
            .all(|&b| is_word(b) || b == b'.' || b == b'-')
}

/// Checks whether all bytes in the given slice are lowercase alphanumeric ASCII characters.
fn is_lowercase_alpha_numeric(src: &[u8]) -> bool {
    src.iter()
        .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}
