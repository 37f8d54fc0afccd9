use super::{ConfigError, Settings};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and validates the YAML settings file at `path`.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let settings = Settings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}

/// Validates `settings` and writes them to `path`, creating parent directories.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<PathBuf, ConfigError> {
    settings.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let body = serde_yaml::to_string(settings).map_err(|source| ConfigError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, body).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path.to_path_buf())
}
