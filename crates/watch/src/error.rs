use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("watch stream: {0}")]
    Stream(String),
    #[error("list api groups: {0}")]
    Probe(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = WatchError> = std::result::Result<T, E>;
