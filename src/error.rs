use thiserror::Error;

/// Failure reported by a data source query.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read stats dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse stats dump: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// No snapshot has been published yet.
    #[error("stats are still being computed")]
    NotReady,

    #[error("refresh loop already started")]
    AlreadyStarted,

    #[error("cache has been stopped")]
    Stopped,
}
