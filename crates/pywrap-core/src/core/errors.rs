use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use pywrap_domain::DependencyMode;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallStep {
    UpgradePackaging,
    Dependencies,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStep::UpgradePackaging => f.write_str("packaging tools upgrade"),
            InstallStep::Dependencies => f.write_str("dependency install"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("invalid {key}={value:?}: {reason}")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("project root not found{}", start.as_ref().map(|p| format!(" from {}", p.display())).unwrap_or_default())]
    ProjectRootNotFound { start: Option<PathBuf> },
    #[error("base interpreter `{requested}` not found")]
    InterpreterNotFound { requested: String },
    #[error("Timeout waiting for lock {} after {:.1}s", path.display(), waited.as_secs_f64())]
    LockTimeout { path: PathBuf, waited: Duration },
    #[error("failed to lock {}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create virtualenv at {} ({}){}", venv.display(), exit_label(*code), tail(detail))]
    CreationFailed {
        venv: PathBuf,
        code: Option<i32>,
        detail: String,
    },
    #[error("{step} failed in {} ({}){}", venv.display(), exit_label(*code), tail(detail))]
    InstallFailed {
        venv: PathBuf,
        step: InstallStep,
        code: Option<i32>,
        detail: String,
    },
    #[error("{mode} mode needs {}, which does not exist", path.display())]
    MissingDependencyFile { mode: DependencyMode, path: PathBuf },
    #[error("failed to compute environment fingerprint: {detail}")]
    Fingerprint { detail: String },
    #[error("failed to record provisioning state at {}", path.display())]
    StateWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    /// Short name of the stage that failed, used as the diagnostic prefix.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            ProvisionError::InvalidConfig { .. } => "config",
            ProvisionError::ProjectRootNotFound { .. } => "locate",
            ProvisionError::InterpreterNotFound { .. } => "interpreter",
            ProvisionError::LockTimeout { .. } | ProvisionError::Lock { .. } => "lock",
            ProvisionError::CreationFailed { .. } => "create",
            ProvisionError::InstallFailed { .. } | ProvisionError::MissingDependencyFile { .. } => {
                "install"
            }
            ProvisionError::Fingerprint { .. } => "fingerprint",
            ProvisionError::StateWriteFailed { .. } => "state",
            ProvisionError::Io { .. } => "io",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ProvisionError::Io {
            context: context.into(),
            source,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "did not run".to_string(), |code| format!("exit code {code}"))
}

fn tail(detail: &str) -> String {
    let trimmed = detail.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    format!(":\n{}", lines[start..].join("\n"))
}
