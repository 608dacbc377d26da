//! Where a project's virtualenv lives and what a complete one looks like.

mod layout;
mod placement;

pub use layout::{interpreter_relative_path, scripts_dir_name};
pub use placement::{
    default_cache_root, stable_project_id, EnvironmentSpec, PlacementMode, PROJECT_ENV_DIR,
    STATE_DIR_NAME,
};
