#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to the docker daemon: {0}")]
    Connect(#[source] bollard::errors::Error),
    #[error("docker `{op}` request failed: {source}")]
    Api {
        op: &'static str,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("docker `{op}` request returned an unexpected response: {message}")]
    Unexpected { op: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

pub(super) fn api(op: &'static str) -> impl Fn(bollard::errors::Error) -> Error {
    move |source| Error::Api { op, source }
}
