#![deny(clippy::all, warnings)]

mod core;

pub use crate::core::config::{EnvSnapshot, LockSettings, WrapperConfig};
pub use crate::core::errors::{InstallStep, ProvisionError};
pub use crate::core::launch::{launch, plan_environment, EnvironmentPlan};
pub use crate::core::lock::EnvLock;
pub use crate::core::provision::{ProvisionOutcome, ProvisionReport, ProvisionStage, Provisioner};
pub use crate::core::python::{resolve_base_python, BaseInterpreter};
pub use crate::core::runtime::delegate::{delegate, DelegateCommand};
pub use crate::core::runtime::process::RunOutput;
pub use crate::core::runtime::toolchain::{InstallRequest, SystemToolchain, Toolchain};
pub use crate::core::state::{
    load_state, save_state, state_path, ProvisionState, ProvisionStatus, STATE_FILE_NAME,
};

/// Version recorded in every state file this build writes.
pub const PYWRAP_VERSION: &str = env!("CARGO_PKG_VERSION");
