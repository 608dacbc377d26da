#![cfg(unix)]
#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use tempfile::TempDir;

/// A shell script that behaves enough like CPython for the wrapper:
/// `-m venv DIR` records DIR in `$FAKE_VENV_LOG` and lays out a venv whose
/// interpreter is a copy of this script. `-m pip ...` appends its arguments to
/// `$FAKE_PY_LOG`. Anything else echoes its argv and `VIRTUAL_ENV`.
const FAKE_PYTHON: &str = r#"#!/bin/sh
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
    echo "$3" >> "$FAKE_VENV_LOG"
    if [ -n "$FAKE_VENV_DELAY" ]; then
        sleep "$FAKE_VENV_DELAY"
    fi
    mkdir -p "$3/bin"
    cp "$0" "$3/bin/python"
    chmod +x "$3/bin/python"
    echo "home = $(dirname "$0")" > "$3/pyvenv.cfg"
    exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ]; then
    shift 2
    echo "pip $*" >> "$FAKE_PY_LOG"
    if [ -n "$FAKE_PIP_FAIL" ]; then
        echo "ERROR: $FAKE_PIP_FAIL" >&2
        exit 1
    fi
    exit 0
fi
echo "fake-python $*"
echo "VIRTUAL_ENV=$VIRTUAL_ENV"
exit ${FAKE_EXIT:-0}
"#;

pub struct Sandbox {
    pub temp: TempDir,
    pub project: PathBuf,
    pub python: PathBuf,
    pub log: PathBuf,
    pub venv_log: PathBuf,
}

impl Sandbox {
    pub fn new(prefix: &str) -> Self {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .expect("tempdir");
        let project = temp.path().join("project");
        fs::create_dir_all(&project).expect("project dir");
        let python = temp.path().join("tools").join("python3");
        write_executable(&python, FAKE_PYTHON);
        let log = temp.path().join("pip.log");
        let venv_log = temp.path().join("venv.log");
        Self {
            temp,
            project: fs::canonicalize(&project).expect("canonical project"),
            python,
            log,
            venv_log,
        }
    }

    pub fn write(&self, name: &str, contents: &str) {
        fs::write(self.project.join(name), contents).expect("write project file");
    }

    pub fn venv(&self) -> PathBuf {
        self.project.join(".venv")
    }

    /// The wrapper, run from the project directory with the fake interpreter
    /// as its base.
    pub fn pywrap(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("pywrap");
        cmd.current_dir(&self.project)
            .env("PYWRAP_BASE_PYTHON", &self.python)
            .env("PYWRAP_PROJECT_ROOT", &self.project)
            .env("PYWRAP_LOCK_POLL_SEC", "0.02")
            .env("FAKE_PY_LOG", &self.log)
            .env("FAKE_VENV_LOG", &self.venv_log)
            .env_remove("FAKE_VENV_DELAY")
            .env_remove("PYWRAP_VENV_MODE")
            .env_remove("PYWRAP_DEP_MODE")
            .env_remove("PYWRAP_INSTALL_DEPS")
            .env_remove("PYWRAP_FORCE_RECREATE")
            .env_remove("PYWRAP_VERBOSE")
            .env_remove("VIRTUAL_ENV");
        cmd
    }

    pub fn pip_calls(&self) -> Vec<String> {
        read_lines(&self.log)
    }

    /// Directories the fake interpreter was asked to turn into a venv.
    pub fn venv_creations(&self) -> Vec<String> {
        read_lines(&self.venv_log)
    }

    pub fn state(&self, env_dir: &Path) -> serde_json::Value {
        let path = env_dir.join(".pywrap").join("ok.json");
        let contents = fs::read_to_string(&path).expect("state file");
        serde_json::from_str(&contents).expect("state json")
    }
}

pub fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|contents| contents.lines().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

fn write_executable(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("script dir");
    }
    fs::write(path, contents).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
}
