use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static APP_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Fixed name of the build transcript written next to the script.
pub const BUILD_LOG_FILENAME: &str = "pack_log.txt";
/// Dependency manifest written next to the script.
pub const MANIFEST_FILENAME: &str = "requirements.txt";
/// Ephemeral environment directory created next to the script.
pub const BUILD_ENV_DIRNAME: &str = ".aiconpack_env";

pub fn get_app_data_dir() -> PathBuf {
    APP_DATA_DIR
        .get_or_init(|| {
            let base_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
            base_dir.join("AIconPack")
        })
        .clone()
}

pub fn get_config_json_path() -> PathBuf {
    get_app_data_dir().join("config.json")
}

pub fn get_manifest_path(script_dir: &Path) -> PathBuf {
    script_dir.join(MANIFEST_FILENAME)
}

pub fn get_build_log_path(script_dir: &Path) -> PathBuf {
    script_dir.join(BUILD_LOG_FILENAME)
}

pub fn get_build_env_dir(script_dir: &Path) -> PathBuf {
    script_dir.join(BUILD_ENV_DIRNAME)
}

/// Interpreter inside a venv rooted at `env_dir`.
pub fn venv_python(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        env_dir.join("bin").join("python")
    }
}
