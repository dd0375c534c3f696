// Atomic JSON and text file operations

use crate::error::Result;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

lazy_static::lazy_static! {
    static ref FILE_LOCK: Mutex<()> = Mutex::new(());
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let _lock = FILE_LOCK.lock();

    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse JSON from {:?}: {}", path, e),
        )
        .into()
    })
}

pub fn read_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.exists() {
        read_json_file(path)
    } else {
        Ok(T::default())
    }
}

/// Writes JSON atomically using write-to-temp-then-rename
pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json_string = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_text_file(path, &json_string)
}

/// Writes text atomically using write-to-temp-then-rename, creating parents
pub fn write_text_file(path: &Path, contents: &str) -> Result<()> {
    let _lock = FILE_LOCK.lock();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(contents.as_bytes())?;
    temp_file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppConfig;
    use tempfile::TempDir;

    #[test]
    fn test_json_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.chat_model = "local-model".into();
        write_json_file(&path, &config).unwrap();

        let loaded: AppConfig = read_json_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        let loaded: AppConfig = read_json_file_or_default(&temp.path().join("absent.json")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(read_json_file::<AppConfig>(&path).is_err());
    }
}
