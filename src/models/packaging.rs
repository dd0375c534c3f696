// Packaging option models
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Operating system the bundle is built on; gates OS-specific flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOs {
    Windows,
    MacOs,
    Linux,
}

impl TargetOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

/// Everything PyInstaller is told about one build.
///
/// Only `script_path` is validated (it must exist). Every other field is
/// optional and independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingOptions {
    pub script_path: PathBuf,
    pub name: Option<String>,
    pub icon: Option<PathBuf>,
    pub onefile: bool,
    /// Hide the console window of the produced executable.
    pub no_console: bool,
    pub clean: bool,
    pub debug: bool,
    pub strip: bool,
    pub no_upx: bool,
    pub upx_dir: Option<PathBuf>,
    pub noconfirm: bool,
    pub hidden_imports: Vec<String>,
    /// Values already in PyInstaller's `SRC<sep>DEST` form.
    pub add_data: Vec<String>,
    pub add_binary: Vec<String>,
    pub runtime_hooks: Vec<PathBuf>,
    pub exclude_modules: Vec<String>,
    pub collect_all: Vec<String>,
    pub paths: Vec<PathBuf>,
    pub dist_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub spec_dir: Option<PathBuf>,
    /// Windows only.
    pub version_file: Option<PathBuf>,
    /// macOS only.
    pub osx_bundle_identifier: Option<String>,
    pub extra_args: Vec<String>,
}

impl PackagingOptions {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            name: None,
            icon: None,
            onefile: true,
            no_console: false,
            clean: true,
            debug: false,
            strip: false,
            no_upx: false,
            upx_dir: None,
            noconfirm: true,
            hidden_imports: Vec::new(),
            add_data: Vec::new(),
            add_binary: Vec::new(),
            runtime_hooks: Vec::new(),
            exclude_modules: Vec::new(),
            collect_all: Vec::new(),
            paths: Vec::new(),
            dist_dir: None,
            work_dir: None,
            spec_dir: None,
            version_file: None,
            osx_bundle_identifier: None,
            extra_args: Vec::new(),
        }
    }

    /// Name PyInstaller will give the build: `--name` or the script stem.
    pub fn app_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.script_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "app".to_string())
        })
    }

    /// Directory PyInstaller resolves its defaults against.
    pub fn script_dir(&self) -> PathBuf {
        self.script_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
