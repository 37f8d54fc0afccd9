//! File-backed trigger queue feeding the provisioning workflows.

pub mod lifecycle;
pub mod message;
pub mod paths;
pub mod worker;

pub use lifecycle::{
    claim_next, complete, dead_letter, enqueue, recover_processing, requeue, sorted_incoming,
    ClaimedMessage,
};
pub use message::{ProvisioningMessage, QueuedMessage};
pub use paths::{QueueFileName, QueuePaths};
pub use worker::{Delivery, Disposition, QueueWorker};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid queue payload in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
