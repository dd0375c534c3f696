// Explicit configuration store; the core never reads global settings itself
use crate::error::Result;
use crate::file_manager::{read_json_file_or_default, write_json_file};
use crate::models::AppConfig;
use crate::utils::get_config_json_path;
use log::debug;
use std::path::{Path, PathBuf};

/// Owns the on-disk config file and the current snapshot.
pub struct ConfigStore {
    path: PathBuf,
    current: AppConfig,
}

impl ConfigStore {
    /// Load from the default location under the app data dir
    pub fn open_default() -> Result<Self> {
        Self::open(get_config_json_path())
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = load(&path)?;
        Ok(Self { path, current })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> &AppConfig {
        &self.current
    }

    /// Re-read the file (and environment overrides) and return the new snapshot
    pub fn reload(&mut self) -> Result<&AppConfig> {
        self.current = load(&self.path)?;
        debug!("Reloaded config from {:?}", self.path);
        Ok(&self.current)
    }

    /// Persist a new snapshot. Environment overrides are not written back.
    pub fn save(&mut self, config: AppConfig) -> Result<()> {
        write_json_file(&self.path, &config)?;
        self.current = config;
        self.current.apply_env();
        Ok(())
    }
}

fn load(path: &Path) -> Result<AppConfig> {
    let mut config: AppConfig = read_json_file_or_default(path)?;
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_reload() {
        let temp = TempDir::new().unwrap();
        let mut store = ConfigStore::open(temp.path().join("config.json")).unwrap();

        let mut config = store.current().clone();
        config.timeout_secs = 15;
        config.templates.insert("mono".into(), "monochrome {prompt}".into());
        store.save(config).unwrap();

        let mut reopened = ConfigStore::open(store.path().to_path_buf()).unwrap();
        let reloaded = reopened.reload().unwrap();
        assert_eq!(reloaded.timeout_secs, 15);
        assert_eq!(reloaded.templates["mono"], "monochrome {prompt}");
    }
}
