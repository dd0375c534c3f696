// Blocking subprocess execution with fully captured output

use crate::error::{AiconError, Result};
use log::debug;
use std::path::Path;
use std::process::{Command, Stdio};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Captured result of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, as written to the build log.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs an argument vector to completion. `argv[0]` is the program.
///
/// Failing to start the program is an error; a nonzero exit is not, the
/// caller decides what a nonzero exit means.
pub trait CommandRunner: Send + Sync {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<ProcessOutput>;
}

/// Runs commands on the host with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<ProcessOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AiconError::Validation("empty command line".to_string()))?;

        debug!("Running: {}", argv.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output = cmd.output()?;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!("{} exited with code {}", program, exit_code);

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_argv_is_rejected() {
        let err = SystemRunner.run(&[], None).unwrap_err();
        assert!(matches!(err, AiconError::Validation(_)));
    }

    #[test]
    fn test_missing_program_is_an_io_error() {
        let argv = vec!["definitely_not_a_real_command_12345".to_string()];
        let err = SystemRunner.run(&argv, None).unwrap_err();
        assert!(matches!(err, AiconError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_both_streams_and_exit_code() {
        let argv: Vec<String> = ["sh", "-c", "echo out; echo err 1>&2; exit 3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = SystemRunner.run(&argv, None).unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }
}
