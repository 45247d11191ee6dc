use thiserror::Error;

#[derive(Debug, Error)]
pub enum FplError {
    /// Timeout, connection failure, non-success status or undecodable body from the API.
    #[error("upstream unavailable: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache store error: {0}")]
    Store(String),
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
