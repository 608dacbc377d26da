//! Environment provisioning: lock, inspect, create or self-heal, install when
//! stale, record state, unlock.

mod stage;

use std::fs;

use pywrap_domain::{compute_fingerprint, DependencyMode, EnvironmentSpec, Fingerprint, CONSTRAINTS_FILE};

pub use stage::ProvisionStage;
use stage::StageTrail;

use crate::core::config::WrapperConfig;
use crate::core::errors::{InstallStep, ProvisionError};
use crate::core::fs::remove_dir_all_writable;
use crate::core::launch::EnvironmentPlan;
use crate::core::lock::EnvLock;
use crate::core::runtime::process::RunOutput;
use crate::core::runtime::toolchain::{InstallRequest, Toolchain};
use crate::core::state::{
    load_state, now_rfc3339, save_state, state_path, ProvisionState, ProvisionStatus,
};
use crate::PYWRAP_VERSION;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Fresh before the lock was requested.
    FastPath,
    /// Fresh once the lock was held; another process had finished the work.
    AlreadyCurrent,
    /// The environment was created, installed into, or re-recorded.
    Provisioned,
}

#[derive(Debug)]
pub struct ProvisionReport {
    pub outcome: ProvisionOutcome,
    pub fingerprint: Fingerprint,
    pub created: bool,
    pub installed: bool,
    pub stages: Vec<ProvisionStage>,
    /// The final state record could not be written. The environment is fresh
    /// for this run; the next run will redo the work.
    pub state_write_error: Option<ProvisionError>,
}

struct Completed {
    outcome: ProvisionOutcome,
    fingerprint: Fingerprint,
    created: bool,
    installed: bool,
    state_write_error: Option<ProvisionError>,
}

pub struct Provisioner<'a> {
    config: &'a WrapperConfig,
    toolchain: &'a dyn Toolchain,
}

impl<'a> Provisioner<'a> {
    #[must_use]
    pub fn new(config: &'a WrapperConfig, toolchain: &'a dyn Toolchain) -> Self {
        Self { config, toolchain }
    }

    /// Brings `plan.env` up to date.
    ///
    /// An unlocked read of the state record decides whether the lock is needed
    /// at all; everything that mutates the environment runs under the lock and
    /// re-checks what it read.
    ///
    /// # Errors
    /// Returns the first fatal [`ProvisionError`]. The lock is always released
    /// before the error is returned.
    pub fn provision(&self, plan: &EnvironmentPlan) -> Result<ProvisionReport, ProvisionError> {
        let mut trail = StageTrail::started();

        if !self.config.force_recreate {
            let fingerprint = self.fingerprint(plan)?;
            let fresh = plan.env.is_structurally_complete()
                && load_state(&plan.env.path)
                    .is_some_and(|state| self.is_satisfied(plan, &state, &fingerprint));
            if fresh {
                tracing::debug!(venv = %plan.env.path.display(), "environment fresh");
                trail.enter(ProvisionStage::Done);
                return Ok(ProvisionReport {
                    outcome: ProvisionOutcome::FastPath,
                    fingerprint,
                    created: false,
                    installed: false,
                    stages: trail.into_stages(),
                    state_write_error: None,
                });
            }
        }

        let lock = match EnvLock::acquire(&plan.env.lock_path(), self.config.lock) {
            Ok(lock) => lock,
            Err(err) => {
                trail.enter(ProvisionStage::Failed);
                return Err(err);
            }
        };
        trail.enter(ProvisionStage::Locked);
        let result = self.provision_locked(plan, &mut trail);
        lock.release();

        match result {
            Ok(done) => {
                trail.enter(ProvisionStage::Done);
                Ok(ProvisionReport {
                    outcome: done.outcome,
                    fingerprint: done.fingerprint,
                    created: done.created,
                    installed: done.installed,
                    stages: trail.into_stages(),
                    state_write_error: done.state_write_error,
                })
            }
            Err(err) => {
                trail.enter(ProvisionStage::Failed);
                Err(err)
            }
        }
    }

    fn provision_locked(
        &self,
        plan: &EnvironmentPlan,
        trail: &mut StageTrail,
    ) -> Result<Completed, ProvisionError> {
        trail.enter(ProvisionStage::Inspecting);
        let env = &plan.env;
        let fingerprint = self.fingerprint(plan)?;
        let previous = load_state(&env.path);
        let complete = env.is_structurally_complete();

        let created = self.config.force_recreate || !complete;
        if created {
            if complete {
                tracing::debug!(venv = %env.path.display(), "recreate forced");
            } else if env.path.exists() {
                tracing::debug!(venv = %env.path.display(), "environment incomplete; recreating");
            }
            trail.enter(ProvisionStage::Creating);
            self.create(plan, &fingerprint)?;
        } else if previous
            .as_ref()
            .is_some_and(|state| self.is_satisfied(plan, state, &fingerprint))
        {
            tracing::debug!(venv = %env.path.display(), "environment became fresh while waiting");
            return Ok(Completed {
                outcome: ProvisionOutcome::AlreadyCurrent,
                fingerprint,
                created: false,
                installed: false,
                state_write_error: None,
            });
        }

        // Past this point the record is missing, partial, or stale, so an
        // enabled install always runs.
        let installed = self.wants_install(plan);
        if installed {
            trail.enter(ProvisionStage::Installing);
            self.install(plan)?;
        } else if plan.selection.mode != DependencyMode::None {
            tracing::debug!(mode = %plan.selection.mode, "dependency install disabled");
        }

        trail.enter(ProvisionStage::Finalizing);
        let state = self.state_record(plan, fingerprint.clone(), ProvisionStatus::Ok, installed);
        let state_write_error = save_state(&env.path, &state).err().map(|source| {
            ProvisionError::StateWriteFailed {
                path: state_path(&env.path),
                source,
            }
        });

        Ok(Completed {
            outcome: ProvisionOutcome::Provisioned,
            fingerprint,
            created,
            installed,
            state_write_error,
        })
    }

    fn create(&self, plan: &EnvironmentPlan, fingerprint: &Fingerprint) -> Result<(), ProvisionError> {
        let env = &plan.env;
        remove_dir_all_writable(&env.path).map_err(|err| {
            ProvisionError::io(format!("failed to remove {}", env.path.display()), err)
        })?;
        if let Some(parent) = env.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ProvisionError::io(format!("failed to create {}", parent.display()), err)
            })?;
        }

        tracing::debug!(
            base = %plan.base.path.display(),
            venv = %env.path.display(),
            "creating environment"
        );
        let output = self
            .toolchain
            .create_environment(&plan.base.path, &env.path)
            .map_err(|err| ProvisionError::CreationFailed {
                venv: env.path.clone(),
                code: None,
                detail: format!("{err:#}"),
            })?;
        if !output.success() {
            return Err(ProvisionError::CreationFailed {
                venv: env.path.clone(),
                code: Some(output.code),
                detail: failure_detail(&output).to_string(),
            });
        }
        if !env.is_structurally_complete() {
            return Err(ProvisionError::CreationFailed {
                venv: env.path.clone(),
                code: Some(output.code),
                detail: format!("no interpreter at {}", env.interpreter().display()),
            });
        }

        let partial = self.state_record(plan, fingerprint.clone(), ProvisionStatus::Partial, false);
        if let Err(err) = save_state(&env.path, &partial) {
            tracing::debug!(venv = %env.path.display(), %err, "could not record partial state");
        }
        Ok(())
    }

    fn install(&self, plan: &EnvironmentPlan) -> Result<(), ProvisionError> {
        let selection = &plan.selection;
        let Some(primary) = selection.primary.as_deref() else {
            return Ok(());
        };
        if !primary.is_file() {
            return Err(ProvisionError::MissingDependencyFile {
                mode: selection.mode,
                path: primary.to_path_buf(),
            });
        }

        if self.config.upgrade_packaging {
            let result = self
                .toolchain
                .upgrade_packaging(&plan.env, &self.config.pip_args);
            check_install(&plan.env, InstallStep::UpgradePackaging, result)?;
        }

        let constraints = match selection.mode {
            DependencyMode::Requirements => {
                Some(plan.root.path().join(CONSTRAINTS_FILE)).filter(|path| path.is_file())
            }
            DependencyMode::ProjectManifest | DependencyMode::None => None,
        };
        let request = InstallRequest {
            env: &plan.env,
            mode: selection.mode,
            primary,
            constraints,
            pip_args: &self.config.pip_args,
        };
        let result = self.toolchain.install_dependencies(&request);
        check_install(&plan.env, InstallStep::Dependencies, result)
    }

    fn fingerprint(&self, plan: &EnvironmentPlan) -> Result<Fingerprint, ProvisionError> {
        compute_fingerprint(&plan.base.identity, plan.root.path(), &plan.selection).map_err(
            |err| ProvisionError::Fingerprint {
                detail: format!("{err:#}"),
            },
        )
    }

    fn wants_install(&self, plan: &EnvironmentPlan) -> bool {
        self.config.install_deps && plan.selection.mode != DependencyMode::None
    }

    fn is_satisfied(
        &self,
        plan: &EnvironmentPlan,
        state: &ProvisionState,
        fingerprint: &Fingerprint,
    ) -> bool {
        state.status == ProvisionStatus::Ok
            && state.fingerprint == *fingerprint
            && (!self.wants_install(plan)
                || (state.dependencies_installed && state.pip_args == self.config.pip_args))
    }

    fn state_record(
        &self,
        plan: &EnvironmentPlan,
        fingerprint: Fingerprint,
        status: ProvisionStatus,
        dependencies_installed: bool,
    ) -> ProvisionState {
        ProvisionState {
            fingerprint,
            status,
            last_verified_at: now_rfc3339(),
            base_python: plan.base.identity.clone(),
            dep_mode: Some(plan.selection.mode),
            dependencies_installed,
            pip_args: self.config.pip_args.clone(),
            wrapper_version: PYWRAP_VERSION.to_string(),
        }
    }
}

fn check_install(
    env: &EnvironmentSpec,
    step: InstallStep,
    result: anyhow::Result<RunOutput>,
) -> Result<(), ProvisionError> {
    match result {
        Ok(output) if output.success() => Ok(()),
        Ok(output) => Err(ProvisionError::InstallFailed {
            venv: env.path.clone(),
            step,
            code: Some(output.code),
            detail: failure_detail(&output).to_string(),
        }),
        Err(err) => Err(ProvisionError::InstallFailed {
            venv: env.path.clone(),
            step,
            code: None,
            detail: format!("{err:#}"),
        }),
    }
}

fn failure_detail(output: &RunOutput) -> &str {
    if output.stderr.trim().is_empty() {
        &output.stdout
    } else {
        &output.stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pywrap_domain::PlacementMode;
    use std::path::Path;

    fn env() -> EnvironmentSpec {
        EnvironmentSpec::resolve(Path::new("/work/app"), PlacementMode::ProjectLocal, None)
    }

    #[test]
    fn install_exit_code_becomes_install_failed() {
        let output = RunOutput {
            code: 2,
            stdout: "collecting".into(),
            stderr: "ERROR: no matching distribution".into(),
        };
        let err = check_install(&env(), InstallStep::Dependencies, Ok(output)).unwrap_err();
        match &err {
            ProvisionError::InstallFailed { code, detail, step, .. } => {
                assert_eq!(*code, Some(2));
                assert_eq!(*step, InstallStep::Dependencies);
                assert!(detail.contains("no matching distribution"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.stage(), "install");
    }

    #[test]
    fn spawn_failure_has_no_exit_code() {
        let err = check_install(
            &env(),
            InstallStep::UpgradePackaging,
            Err(anyhow::anyhow!("failed to start python")),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::InstallFailed {
                code: None,
                step: InstallStep::UpgradePackaging,
                ..
            }
        ));
    }

    #[test]
    fn failure_detail_falls_back_to_stdout() {
        let output = RunOutput {
            code: 1,
            stdout: "only stdout".into(),
            stderr: "  \n".into(),
        };
        assert_eq!(failure_detail(&output), "only stdout");
    }
}
