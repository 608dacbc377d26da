#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod dependencies;
pub mod environment;
pub mod fingerprint;
pub mod project;

pub use dependencies::{
    select_dependency_mode, DependencyMode, DependencySelection, SelectionSource, CONSTRAINTS_FILE,
    DEFAULT_REQUIREMENTS_FILE, PROJECT_MANIFEST_FILE,
};
pub use environment::{
    default_cache_root, stable_project_id, EnvironmentSpec, PlacementMode, PROJECT_ENV_DIR,
    STATE_DIR_NAME,
};
pub use fingerprint::{compute_fingerprint, fingerprint_files, Fingerprint};
pub use project::{discover_project_root, resolve_project_root, ProjectRoot, RootSource, PROJECT_MARKERS};
