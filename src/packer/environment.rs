// Ephemeral virtual environment for one build job

use super::command::PYINSTALLER_MODULE;
use crate::error::{AiconError, Result};
use crate::models::DependencySet;
use crate::process_manager::{CommandRunner, ProcessOutput};
use crate::utils::venv_python;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Installed into every build environment next to the script's own packages.
pub const BUNDLER_PACKAGE: &str = "pyinstaller";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Absent,
    Created,
    DependenciesInstalled,
    Ready,
    Failed,
}

/// Creates, fills and removes an isolated interpreter environment.
pub trait Provisioner: Send {
    fn state(&self) -> ProvisionState;

    /// Destroy anything at the environment location and create it fresh.
    /// Returns the environment's interpreter.
    fn create(&mut self) -> Result<PathBuf>;

    /// Upgrade the installer, then install the bundler and `deps` in one batch.
    fn install(&mut self, deps: &DependencySet) -> Result<()>;

    /// Confirm the bundler runs inside the environment.
    fn verify(&mut self) -> Result<()>;

    /// Remove the environment directory tree.
    fn teardown(&mut self) -> Result<()>;

    /// Output captured from every command run so far, drained on read.
    fn take_transcript(&mut self) -> String;

    fn provision(&mut self, deps: &DependencySet) -> Result<PathBuf> {
        let python = self.create()?;
        self.install(deps)?;
        self.verify()?;
        Ok(python)
    }
}

/// `python -m venv` based provisioner.
pub struct VenvProvisioner {
    env_dir: PathBuf,
    host_python: String,
    runner: Arc<dyn CommandRunner>,
    state: ProvisionState,
    transcript: String,
}

impl VenvProvisioner {
    pub fn new(env_dir: impl Into<PathBuf>, host_python: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            env_dir: env_dir.into(),
            host_python: host_python.into(),
            runner,
            state: ProvisionState::Absent,
            transcript: String::new(),
        }
    }

    pub fn env_dir(&self) -> &Path {
        &self.env_dir
    }

    fn interpreter(&self) -> String {
        venv_python(&self.env_dir).to_string_lossy().to_string()
    }

    fn run_step(&mut self, what: &str, argv: Vec<String>) -> Result<ProcessOutput> {
        let output = match self.runner.run(&argv, None) {
            Ok(output) => output,
            Err(e) => {
                self.state = ProvisionState::Failed;
                return Err(AiconError::Provisioning(format!("{}: {}", what, e)));
            }
        };

        self.transcript.push_str(&format!("$ {}\n{}\n", argv.join(" "), output.combined()));

        if !output.success() {
            self.state = ProvisionState::Failed;
            return Err(AiconError::Provisioning(format!(
                "{} exited with code {}: {}",
                what,
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl Provisioner for VenvProvisioner {
    fn state(&self) -> ProvisionState {
        self.state
    }

    fn create(&mut self) -> Result<PathBuf> {
        if self.env_dir.exists() {
            fs::remove_dir_all(&self.env_dir).map_err(|e| {
                self.state = ProvisionState::Failed;
                AiconError::Provisioning(format!(
                    "could not remove stale environment {}: {}",
                    self.env_dir.display(),
                    e
                ))
            })?;
        }

        info!("Creating build environment at {}", self.env_dir.display());
        let argv = vec![
            self.host_python.clone(),
            "-m".to_string(),
            "venv".to_string(),
            self.env_dir.to_string_lossy().to_string(),
        ];
        self.run_step("venv creation", argv)?;

        self.state = ProvisionState::Created;
        Ok(venv_python(&self.env_dir))
    }

    fn install(&mut self, deps: &DependencySet) -> Result<()> {
        if self.state != ProvisionState::Created {
            return Err(AiconError::Provisioning(
                "environment must be created before installing".to_string(),
            ));
        }
        let python = self.interpreter();

        let upgrade = vec![
            python.clone(),
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "--upgrade".to_string(),
            "pip".to_string(),
        ];
        self.run_step("pip upgrade", upgrade)?;

        let mut install = vec![
            python,
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            BUNDLER_PACKAGE.to_string(),
        ];
        install.extend(deps.iter().cloned());
        info!("Installing {} package(s) plus {}", deps.len(), BUNDLER_PACKAGE);
        self.run_step("dependency install", install)?;

        self.state = ProvisionState::DependenciesInstalled;
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        if self.state != ProvisionState::DependenciesInstalled {
            return Err(AiconError::Provisioning(
                "dependencies must be installed before the environment is ready".to_string(),
            ));
        }
        let check = vec![
            self.interpreter(),
            "-m".to_string(),
            PYINSTALLER_MODULE.to_string(),
            "--version".to_string(),
        ];
        let output = self.run_step("bundler check", check)?;
        info!("Build environment ready, PyInstaller {}", output.stdout.trim());

        self.state = ProvisionState::Ready;
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        if self.env_dir.exists() {
            fs::remove_dir_all(&self.env_dir)?;
            info!("Removed build environment {}", self.env_dir.display());
        }
        self.state = ProvisionState::Absent;
        Ok(())
    }

    fn take_transcript(&mut self) -> String {
        std::mem::take(&mut self.transcript)
    }
}

/// Owns a provisioner for the duration of one job and tears it down exactly
/// once: explicitly through [`EnvGuard::finish`], or on drop if unwinding.
pub struct EnvGuard {
    provisioner: Option<Box<dyn Provisioner>>,
}

impl EnvGuard {
    pub fn new(provisioner: Box<dyn Provisioner>) -> Self {
        Self {
            provisioner: Some(provisioner),
        }
    }

    pub fn provisioner(&mut self) -> Option<&mut (dyn Provisioner + 'static)> {
        self.provisioner.as_deref_mut()
    }

    /// Tear down now. Returns the remaining transcript and the teardown result.
    pub fn finish(mut self) -> (String, Result<()>) {
        match self.provisioner.take() {
            Some(mut p) => {
                let result = p.teardown();
                (p.take_transcript(), result)
            }
            None => (String::new(), Ok(())),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(mut p) = self.provisioner.take() {
            if let Err(e) = p.teardown() {
                warn!("Environment teardown failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Records argv and mimics `python -m venv` by creating the directory.
    struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl ScriptedRunner {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, argv: &[String], _cwd: Option<&Path>) -> Result<ProcessOutput> {
            self.calls.lock().push(argv.to_vec());
            if argv.get(2).map(String::as_str) == Some("venv") {
                fs::create_dir_all(&argv[3])?;
            }
            let failing = self.fail_on.map(|word| argv.iter().any(|a| a == word)).unwrap_or(false);
            Ok(ProcessOutput {
                exit_code: if failing { 1 } else { 0 },
                stdout: "ok".to_string(),
                stderr: if failing { "boom".to_string() } else { String::new() },
            })
        }
    }

    fn deps() -> DependencySet {
        ["requests", "numpy"].into_iter().collect()
    }

    #[test]
    fn test_provision_runs_steps_in_order() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env");
        let runner = Arc::new(ScriptedRunner::new(None));
        let mut venv = VenvProvisioner::new(&env, "python3", runner.clone());

        assert_eq!(venv.state(), ProvisionState::Absent);

        let python = venv.create().unwrap();
        assert_eq!(python, venv_python(&env));
        assert_eq!(venv.state(), ProvisionState::Created);

        venv.install(&deps()).unwrap();
        assert_eq!(venv.state(), ProvisionState::DependenciesInstalled);

        venv.verify().unwrap();
        assert_eq!(venv.state(), ProvisionState::Ready);

        let calls = runner.calls.lock();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0][..3], ["python3", "-m", "venv"]);
        assert_eq!(calls[1][3..], ["install", "--upgrade", "pip"]);
        assert_eq!(calls[2][4..], ["pyinstaller", "numpy", "requests"]);
        assert_eq!(calls[3][1..], ["-m", "PyInstaller", "--version"]);
    }

    #[test]
    fn test_create_replaces_existing_directory() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env");
        fs::create_dir_all(&env).unwrap();
        fs::write(env.join("stale.txt"), "old").unwrap();

        let mut venv = VenvProvisioner::new(&env, "python3", Arc::new(ScriptedRunner::new(None)));
        venv.create().unwrap();
        assert!(env.is_dir());
        assert!(!env.join("stale.txt").exists());
    }

    #[test]
    fn test_install_failure_marks_failed() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env");
        let mut venv = VenvProvisioner::new(&env, "python3", Arc::new(ScriptedRunner::new(Some("pyinstaller"))));

        let err = venv.provision(&deps()).unwrap_err();
        assert!(matches!(err, AiconError::Provisioning(_)));
        assert!(err.to_string().contains("boom"));
        assert_eq!(venv.state(), ProvisionState::Failed);
        assert!(venv.take_transcript().contains("pyinstaller"));
    }

    #[test]
    fn test_failed_bundler_check_is_not_ready() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env");
        let mut venv = VenvProvisioner::new(&env, "python3", Arc::new(ScriptedRunner::new(Some("--version"))));

        let err = venv.provision(&deps()).unwrap_err();
        assert!(matches!(err, AiconError::Provisioning(_)));
        assert_eq!(venv.state(), ProvisionState::Failed);
    }

    #[test]
    fn test_verify_requires_install() {
        let temp = TempDir::new().unwrap();
        let mut venv = VenvProvisioner::new(temp.path().join("env"), "python3", Arc::new(ScriptedRunner::new(None)));
        venv.create().unwrap();
        assert!(venv.verify().is_err());
    }

    #[test]
    fn test_install_requires_creation() {
        let temp = TempDir::new().unwrap();
        let mut venv = VenvProvisioner::new(temp.path().join("env"), "python3", Arc::new(ScriptedRunner::new(None)));
        assert!(venv.install(&deps()).is_err());
    }

    #[test]
    fn test_teardown_removes_tree() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env");
        let mut venv = VenvProvisioner::new(&env, "python3", Arc::new(ScriptedRunner::new(None)));
        venv.create().unwrap();
        fs::write(env.join("marker"), "x").unwrap();

        venv.teardown().unwrap();
        assert!(!env.exists());
        assert_eq!(venv.state(), ProvisionState::Absent);
        venv.teardown().unwrap();
    }

    #[test]
    fn test_guard_tears_down_on_drop() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env");
        let mut venv = VenvProvisioner::new(&env, "python3", Arc::new(ScriptedRunner::new(None)));
        venv.create().unwrap();

        {
            let _guard = EnvGuard::new(Box::new(venv));
        }
        assert!(!env.exists());
    }
}
