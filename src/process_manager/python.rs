// Host Python interpreter discovery

use std::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Pick the interpreter used outside any build environment.
///
/// A configured interpreter always wins; otherwise the first candidate that
/// answers `--version` is used.
pub fn get_python_path(configured: Option<&str>) -> String {
    if let Some(python) = configured.map(str::trim).filter(|p| !p.is_empty()) {
        return python.to_string();
    }

    #[cfg(target_os = "windows")]
    let paths = ["python", "python3", "py"];

    #[cfg(not(target_os = "windows"))]
    let paths = ["python3", "python"];

    for path in paths {
        let mut cmd = Command::new(path);
        cmd.arg("--version");

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        if cmd.output().map(|o| o.status.success()).unwrap_or(false) {
            return path.to_string();
        }
    }

    "python".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_interpreter_wins() {
        assert_eq!(get_python_path(Some("/opt/py/bin/python3.12")), "/opt/py/bin/python3.12");
    }

    #[test]
    fn test_blank_configuration_is_ignored() {
        let found = get_python_path(Some("  "));
        assert!(!found.trim().is_empty());
    }
}
