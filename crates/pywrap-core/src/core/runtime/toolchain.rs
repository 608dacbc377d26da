use std::path::{Path, PathBuf};

use anyhow::Result;
use pywrap_domain::{DependencyMode, EnvironmentSpec};

use super::process::{run_command, RunOutput};

/// Everything the dependency installer needs for one run.
#[derive(Debug, Clone)]
pub struct InstallRequest<'a> {
    pub env: &'a EnvironmentSpec,
    pub mode: DependencyMode,
    pub primary: &'a Path,
    /// Passed as `-c` in requirements mode when present.
    pub constraints: Option<PathBuf>,
    pub pip_args: &'a [String],
}

/// The external operations the provisioner drives. `Err` means the tool could
/// not be run at all; a non-zero [`RunOutput::code`] means it ran and failed.
pub trait Toolchain: Send + Sync {
    fn create_environment(&self, base_python: &Path, target: &Path) -> Result<RunOutput>;
    fn upgrade_packaging(&self, env: &EnvironmentSpec, pip_args: &[String]) -> Result<RunOutput>;
    fn install_dependencies(&self, request: &InstallRequest<'_>) -> Result<RunOutput>;
}

/// `python -m venv` plus `python -m pip`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn create_environment(&self, base_python: &Path, target: &Path) -> Result<RunOutput> {
        let cwd = target.parent().unwrap_or(target);
        let args = vec!["-m".into(), "venv".into(), target.as_os_str().to_os_string()];
        tracing::debug!(python = %base_python.display(), target = %target.display(), "creating virtualenv");
        run_command(base_python, &args, &[], cwd)
    }

    fn upgrade_packaging(&self, env: &EnvironmentSpec, pip_args: &[String]) -> Result<RunOutput> {
        let mut args = pip_prefix();
        args.extend(["install", "--upgrade", "pip"].map(String::from));
        args.extend(pip_args.iter().cloned());
        tracing::debug!(?args, "upgrading packaging tools");
        run_command(&env.interpreter(), &args, &pip_env(env), &env.root)
    }

    fn install_dependencies(&self, request: &InstallRequest<'_>) -> Result<RunOutput> {
        let args = install_args(request);
        tracing::debug!(?args, "installing dependencies");
        run_command(
            &request.env.interpreter(),
            &args,
            &pip_env(request.env),
            &request.env.root,
        )
    }
}

fn pip_prefix() -> Vec<String> {
    vec!["-m".into(), "pip".into()]
}

fn pip_env(env: &EnvironmentSpec) -> Vec<(String, String)> {
    vec![
        ("VIRTUAL_ENV".into(), env.path.display().to_string()),
        ("PIP_DISABLE_PIP_VERSION_CHECK".into(), "1".into()),
    ]
}

pub(crate) fn install_args(request: &InstallRequest<'_>) -> Vec<String> {
    let mut args = pip_prefix();
    args.push("install".into());
    match request.mode {
        DependencyMode::Requirements => {
            args.push("-r".into());
            args.push(request.primary.display().to_string());
            if let Some(constraints) = &request.constraints {
                args.push("-c".into());
                args.push(constraints.display().to_string());
            }
        }
        DependencyMode::ProjectManifest => {
            let project_dir = request
                .primary
                .parent()
                .unwrap_or(request.env.root.as_path());
            args.push("-e".into());
            args.push(project_dir.display().to_string());
        }
        DependencyMode::None => {}
    }
    args.extend(request.pip_args.iter().cloned());
    args
}
