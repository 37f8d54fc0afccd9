use crate::shared::ids::sanitize_component;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    pub incoming: PathBuf,
    pub processing: PathBuf,
    pub completed: PathBuf,
    pub deadletter: PathBuf,
}

impl QueuePaths {
    pub fn from_state_root(state_root: &Path) -> Self {
        Self {
            incoming: state_root.join("queue/incoming"),
            processing: state_root.join("queue/processing"),
            completed: state_root.join("queue/completed"),
            deadletter: state_root.join("queue/deadletter"),
        }
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            &self.incoming,
            &self.processing,
            &self.completed,
            &self.deadletter,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Decoded `<notBefore>_<messageId>_<attempt>.json`. `not_before` is zero
/// padded so that lexical order is delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFileName {
    pub not_before: i64,
    pub message_id: String,
    pub attempt: u32,
}

impl QueueFileName {
    pub fn new(not_before: i64, message_id: &str, attempt: u32) -> Self {
        Self {
            not_before,
            message_id: sanitize_component(message_id),
            attempt,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{:012}_{}_{}.json",
            self.not_before.max(0),
            self.message_id,
            self.attempt
        )
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json")?;
        let (not_before, rest) = stem.split_once('_')?;
        let (message_id, attempt) = rest.rsplit_once('_')?;
        if message_id.is_empty() {
            return None;
        }
        Some(Self {
            not_before: not_before.parse().ok()?,
            message_id: message_id.to_string(),
            attempt: attempt.parse().ok()?,
        })
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.not_before <= now
    }

    /// The same message, one delivery later.
    pub fn redelivery(&self, not_before: i64) -> Self {
        Self {
            not_before,
            message_id: self.message_id.clone(),
            attempt: self.attempt.saturating_add(1),
        }
    }
}
