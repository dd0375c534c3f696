// PyInstaller command-line construction
//
// Pure translation of PackagingOptions into argv. No filesystem access, no
// deduplication: PyInstaller itself lets the last occurrence of a flag win.

use crate::models::{PackagingOptions, TargetOs};
use std::path::Path;

/// Module name passed to `python -m`.
pub const PYINSTALLER_MODULE: &str = "PyInstaller";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBuilder {
    target: TargetOs,
}

impl CommandBuilder {
    pub fn new(target: TargetOs) -> Self {
        Self { target }
    }

    /// Build for the OS this binary runs on.
    pub fn for_host() -> Self {
        Self::new(TargetOs::current())
    }

    /// Arguments following `python -m PyInstaller`, script first.
    pub fn build(&self, script_path: &Path, options: &PackagingOptions) -> Vec<String> {
        let mut args = vec![path_arg(script_path)];

        push_value(&mut args, "--name", options.name.as_deref());
        push_value(&mut args, "--icon", options.icon.as_deref().map(path_arg).as_deref());

        push_flag(&mut args, "--onefile", options.onefile);
        push_flag(&mut args, "--noconsole", options.no_console);
        push_flag(&mut args, "--clean", options.clean);
        push_flag(&mut args, "--debug=all", options.debug);
        push_flag(&mut args, "--strip", options.strip);
        push_flag(&mut args, "--noupx", options.no_upx);
        push_flag(&mut args, "--noconfirm", options.noconfirm);

        push_value(&mut args, "--upx-dir", options.upx_dir.as_deref().map(path_arg).as_deref());

        push_each(&mut args, "--hidden-import", options.hidden_imports.iter().cloned());
        push_each(&mut args, "--add-data", options.add_data.iter().cloned());
        push_each(&mut args, "--add-binary", options.add_binary.iter().cloned());
        push_each(&mut args, "--runtime-hook", options.runtime_hooks.iter().map(|p| path_arg(p)));
        push_each(&mut args, "--exclude-module", options.exclude_modules.iter().cloned());
        push_each(&mut args, "--collect-all", options.collect_all.iter().cloned());
        push_each(&mut args, "--paths", options.paths.iter().map(|p| path_arg(p)));

        push_value(&mut args, "--distpath", options.dist_dir.as_deref().map(path_arg).as_deref());
        push_value(&mut args, "--workpath", options.work_dir.as_deref().map(path_arg).as_deref());
        push_value(&mut args, "--specpath", options.spec_dir.as_deref().map(path_arg).as_deref());

        if self.target == TargetOs::Windows {
            push_value(
                &mut args,
                "--version-file",
                options.version_file.as_deref().map(path_arg).as_deref(),
            );
        }
        if self.target == TargetOs::MacOs {
            push_value(
                &mut args,
                "--osx-bundle-identifier",
                options.osx_bundle_identifier.as_deref(),
            );
        }

        args.extend(options.extra_args.iter().cloned());
        args
    }

    /// Full command line running PyInstaller through `python`.
    pub fn invocation(&self, python: &Path, options: &PackagingOptions) -> Vec<String> {
        let mut argv = vec![path_arg(python), "-m".to_string(), PYINSTALLER_MODULE.to_string()];
        argv.extend(self.build(&options.script_path, options));
        argv
    }
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::for_host()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn push_flag(args: &mut Vec<String>, flag: &str, enabled: bool) {
    if enabled {
        args.push(flag.to_string());
    }
}

fn push_value(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

fn push_each<I: IntoIterator<Item = String>>(args: &mut Vec<String>, flag: &str, values: I) {
    for value in values {
        args.push(flag.to_string());
        args.push(value);
    }
}
