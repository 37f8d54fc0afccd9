use super::message::{ProvisioningMessage, QueuedMessage};
use super::paths::{QueueFileName, QueuePaths};
use super::QueueError;
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::ids::new_record_id;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ClaimedMessage {
    pub processing_path: PathBuf,
    pub name: QueueFileName,
    pub raw: String,
}

/// Writes a new message to `incoming/`, due immediately.
pub fn enqueue(
    paths: &QueuePaths,
    message: &ProvisioningMessage,
    now: i64,
) -> Result<PathBuf, QueueError> {
    let queued = QueuedMessage {
        message_id: new_record_id(),
        enqueued_at: now,
        message: message.clone(),
    };
    let name = QueueFileName::new(now, &queued.message_id, 1);
    let path = paths.incoming.join(name.render());
    let body = serde_json::to_string_pretty(&queued).map_err(|e| parse_err(&path, e))?;
    atomic_write_file(&path, body.as_bytes()).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// Moves the first due message from `incoming/` to `processing/`. Files that
/// are not due yet, or whose names do not decode, are left alone.
pub fn claim_next(paths: &QueuePaths, now: i64) -> Result<Option<ClaimedMessage>, QueueError> {
    for (incoming_path, name) in sorted_incoming(&paths.incoming)? {
        if !name.is_due(now) {
            // Sorted by due time, so nothing later is due either.
            break;
        }
        let Some(file_name) = incoming_path.file_name() else {
            continue;
        };
        let processing_path = paths.processing.join(file_name);
        match fs::rename(&incoming_path, &processing_path) {
            Ok(()) => {
                let raw = fs::read_to_string(&processing_path)
                    .map_err(|e| io_err(&processing_path, e))?;
                return Ok(Some(ClaimedMessage {
                    processing_path,
                    name,
                    raw,
                }));
            }
            // Another worker claimed it first.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&incoming_path, err)),
        }
    }
    Ok(None)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRecord<'a, R: Serialize> {
    message_id: &'a str,
    attempt: u32,
    completed_at: i64,
    completed_at_utc: String,
    report: &'a R,
}

/// Records the result in `completed/` and drops the processing file.
pub fn complete<R: Serialize>(
    paths: &QueuePaths,
    claimed: &ClaimedMessage,
    report: &R,
    now: i64,
) -> Result<PathBuf, QueueError> {
    let out_path = paths.completed.join(format!(
        "{}_{}.json",
        claimed.name.message_id, claimed.name.attempt
    ));
    let record = CompletionRecord {
        message_id: &claimed.name.message_id,
        attempt: claimed.name.attempt,
        completed_at: now,
        completed_at_utc: chrono::DateTime::from_timestamp(now, 0)
            .map(|at| at.to_rfc3339())
            .unwrap_or_default(),
        report,
    };
    let body = serde_json::to_string_pretty(&record).map_err(|e| parse_err(&out_path, e))?;
    atomic_write_file(&out_path, body.as_bytes()).map_err(|e| io_err(&out_path, e))?;
    fs::remove_file(&claimed.processing_path).map_err(|e| io_err(&claimed.processing_path, e))?;
    Ok(out_path)
}

/// Puts the message back in `incoming/` as the next attempt, due at `not_before`.
pub fn requeue(
    paths: &QueuePaths,
    claimed: &ClaimedMessage,
    not_before: i64,
) -> Result<PathBuf, QueueError> {
    let incoming = paths
        .incoming
        .join(claimed.name.redelivery(not_before).render());
    fs::rename(&claimed.processing_path, &incoming)
        .map_err(|e| io_err(&claimed.processing_path, e))?;
    Ok(incoming)
}

/// Moves the message to `deadletter/` next to a `.reason.txt` explaining why.
pub fn dead_letter(
    paths: &QueuePaths,
    claimed: &ClaimedMessage,
    reason: &str,
) -> Result<PathBuf, QueueError> {
    let file_name = claimed.name.render();
    let target = paths.deadletter.join(&file_name);
    let reason_path = paths
        .deadletter
        .join(format!("{}.reason.txt", file_name.trim_end_matches(".json")));
    atomic_write_file(&reason_path, format!("{reason}\n").as_bytes())
        .map_err(|e| io_err(&reason_path, e))?;
    fs::rename(&claimed.processing_path, &target)
        .map_err(|e| io_err(&claimed.processing_path, e))?;
    Ok(target)
}

/// Returns files stranded in `processing/` by a crashed worker to `incoming/`.
pub fn recover_processing(paths: &QueuePaths) -> Result<usize, QueueError> {
    let mut recovered = 0;
    for entry in fs::read_dir(&paths.processing).map_err(|e| io_err(&paths.processing, e))? {
        let entry = entry.map_err(|e| io_err(&paths.processing, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = paths.incoming.join(file_name);
        fs::rename(&path, &target).map_err(|e| io_err(&path, e))?;
        recovered += 1;
    }
    Ok(recovered)
}

/// Queue files in `dir` ordered by due time, then message id.
pub fn sorted_incoming(dir: &Path) -> Result<Vec<(PathBuf, QueueFileName)>, QueueError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(QueueFileName::parse)
        else {
            continue;
        };
        entries.push((path, name));
    }
    entries.sort_by(|(a_path, a), (b_path, b)| {
        a.not_before
            .cmp(&b.not_before)
            .then_with(|| a_path.file_name().cmp(&b_path.file_name()))
    });
    Ok(entries)
}

fn io_err(path: &Path, source: std::io::Error) -> QueueError {
    QueueError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn parse_err(path: &Path, source: serde_json::Error) -> QueueError {
    QueueError::Parse {
        path: path.display().to_string(),
        source,
    }
}
