//! Project root discovery.

mod root;

pub use root::{discover_project_root, resolve_project_root, ProjectRoot, RootSource, PROJECT_MARKERS};
