use super::ids::new_record_id;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes `content` next to `path` under a unique dot-prefixed name, syncs it
/// and renames it over `path`. The staging name never parses as a queue file
/// name, so scans only ever see complete messages.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("provisio");
    let staging = parent.join(format!(".{file_name}.{}.tmp", new_record_id()));

    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&staging)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_existing_file_without_leaving_staging_files() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("nested/report.json");
        atomic_write_file(&target, b"first").expect("first write");
        atomic_write_file(&target, b"second").expect("second write");

        assert_eq!(fs::read(&target).expect("read"), b"second");
        let entries: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .expect("read dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
