use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TigerclawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pipeline lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Pipeline index error: {0}")]
    Index(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
