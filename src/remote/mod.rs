pub mod api;
pub mod client;
pub mod copy;
pub mod graph;
pub mod memory;
pub mod retry;
pub mod types;

pub use api::GraphApi;
pub use client::ResourceClient;
pub use copy::CopyReport;
pub use graph::GraphClient;
pub use memory::{CallCounts, InMemoryGraph};
pub use retry::RetryPolicy;
pub use types::{
    Channel, Column, ColumnDefinition, Drive, DriveItem, FolderResult, Group, InstalledApp,
    ItemTree, NewGroup, NewTab, Plan, Tab, Team, User,
};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote resource not found: {0}")]
    NotFound(String),
    #[error("remote resource already exists: {0}")]
    Conflict(String),
    #[error("remote request timed out: {0}")]
    Timeout(String),
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote api responded with status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("failed to decode remote response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("missing access token; set env var `{0}`")]
    MissingToken(String),
}

impl RemoteError {
    /// Timeouts count as "not found yet" and are left to the retry windows.
    pub fn is_not_found_like(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Timeout(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
