pub mod cli;
pub mod commands;

pub use commands::run_cli;

use crate::config::ConfigError;
use crate::queue::QueueError;
use crate::remote::RemoteError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid message in {path}: {reason}")]
    InvalidMessage { path: String, reason: String },
}
