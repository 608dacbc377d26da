use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use pywrap_domain::EnvironmentSpec;

use crate::core::errors::ProvisionError;

/// The final hand-off: the environment's interpreter with the caller's
/// arguments, untouched.
#[derive(Debug, Clone)]
pub struct DelegateCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
}

impl DelegateCommand {
    #[must_use]
    pub fn for_environment(
        env: &EnvironmentSpec,
        args: Vec<OsString>,
        search_path: Option<&str>,
    ) -> Self {
        let scripts = env.scripts_dir();
        let inherited = search_path.map(|raw| env::split_paths(raw).collect::<Vec<_>>());
        let path = env::join_paths(
            std::iter::once(scripts.clone()).chain(inherited.into_iter().flatten()),
        )
        .unwrap_or_else(|_| scripts.into_os_string());
        Self {
            program: env.interpreter(),
            args,
            envs: vec![
                ("VIRTUAL_ENV".into(), env.path.clone().into_os_string()),
                ("PATH".into(), path),
            ],
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.env_remove("PYTHONHOME");
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

/// Runs the delegate with inherited stdio.
///
/// On Unix the current process image is replaced and this only returns on
/// failure. Elsewhere the child is awaited and its exit code returned.
///
/// # Errors
/// Returns [`ProvisionError::Io`] when the interpreter cannot be started.
#[cfg(unix)]
pub fn delegate(delegate: &DelegateCommand) -> Result<i32, ProvisionError> {
    use std::os::unix::process::CommandExt;

    tracing::debug!(program = %delegate.program.display(), "exec");
    let err = delegate.command().exec();
    Err(ProvisionError::io(
        format!("failed to exec {}", delegate.program.display()),
        err,
    ))
}

/// Runs the delegate with inherited stdio.
///
/// On Unix the current process image is replaced and this only returns on
/// failure. Elsewhere the child is awaited and its exit code returned.
///
/// # Errors
/// Returns [`ProvisionError::Io`] when the interpreter cannot be started.
#[cfg(not(unix))]
pub fn delegate(delegate: &DelegateCommand) -> Result<i32, ProvisionError> {
    tracing::debug!(program = %delegate.program.display(), "spawning delegate");
    let status = delegate.command().status().map_err(|err| {
        ProvisionError::io(format!("failed to start {}", delegate.program.display()), err)
    })?;
    Ok(status.code().unwrap_or(1))
}
