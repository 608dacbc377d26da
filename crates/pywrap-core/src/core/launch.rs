use std::ffi::OsString;

use pywrap_domain::{
    resolve_project_root, select_dependency_mode, DependencySelection, EnvironmentSpec,
    ProjectRoot, RootSource, PROJECT_MARKERS,
};

use crate::core::config::WrapperConfig;
use crate::core::errors::ProvisionError;
use crate::core::provision::Provisioner;
use crate::core::python::{resolve_base_python, BaseInterpreter};
use crate::core::runtime::delegate::{delegate, DelegateCommand};
use crate::core::runtime::toolchain::Toolchain;

/// Everything resolved before the lock is taken.
#[derive(Debug, Clone)]
pub struct EnvironmentPlan {
    pub root: ProjectRoot,
    pub env: EnvironmentSpec,
    pub selection: DependencySelection,
    pub base: BaseInterpreter,
}

/// Resolves the project root, environment location, dependency mode, and base
/// interpreter. Nothing on disk is modified.
///
/// # Errors
/// [`ProvisionError::ProjectRootNotFound`] when neither an explicit root nor
/// a working directory is available, or the explicit root is not a
/// directory; [`ProvisionError::InterpreterNotFound`] from interpreter lookup.
pub fn plan_environment(config: &WrapperConfig) -> Result<EnvironmentPlan, ProvisionError> {
    let root = match (&config.project_root, &config.cwd) {
        (Some(explicit), _) if explicit.is_dir() => ProjectRoot::new(explicit, RootSource::Explicit),
        (Some(explicit), _) => {
            return Err(ProvisionError::ProjectRootNotFound {
                start: Some(explicit.clone()),
            })
        }
        (None, Some(cwd)) => resolve_project_root(cwd, PROJECT_MARKERS),
        (None, None) => return Err(ProvisionError::ProjectRootNotFound { start: None }),
    };

    let env = EnvironmentSpec::resolve(root.path(), config.placement, config.cache_root.as_deref());
    let selection = select_dependency_mode(
        root.path(),
        config.dependency_mode,
        config.requirements.as_deref(),
    );
    let lookup_dir = config.cwd.as_deref().unwrap_or_else(|| root.path());
    let base = resolve_base_python(
        config.base_python.as_deref(),
        config.search_path.as_deref(),
        lookup_dir,
        config.wrapper_exe.as_deref(),
    )?;

    tracing::debug!(
        root = %root.path().display(),
        source = %root.source(),
        placement = config.placement.as_str(),
        selection = ?selection.source,
        base = %base.path.display(),
        "environment planned"
    );
    Ok(EnvironmentPlan {
        root,
        env,
        selection,
        base,
    })
}

/// Plans, provisions, and hands off to the environment's interpreter with
/// `args` untouched. Returns the exit code to propagate; on Unix a successful
/// hand-off never returns.
///
/// # Errors
/// Any fatal [`ProvisionError`]; nothing is delegated in that case.
pub fn launch(
    config: &WrapperConfig,
    toolchain: &dyn Toolchain,
    args: Vec<OsString>,
) -> Result<i32, ProvisionError> {
    let plan = plan_environment(config)?;
    tracing::info!(
        "[pywrap] project_root={} venv_dir={} dep_mode={}",
        plan.root.path().display(),
        plan.env.path.display(),
        plan.selection.mode
    );

    let report = Provisioner::new(config, toolchain).provision(&plan)?;
    if let Some(err) = &report.state_write_error {
        tracing::warn!(%err, "environment is ready but its state was not recorded; the next run will re-provision");
    }
    tracing::debug!(
        outcome = ?report.outcome,
        created = report.created,
        installed = report.installed,
        fingerprint = report.fingerprint.as_str(),
        "provisioned"
    );

    let command = DelegateCommand::for_environment(&plan.env, args, config.search_path.as_deref());
    delegate(&command)
}
