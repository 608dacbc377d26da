use std::{
    fmt,
    path::{Path, PathBuf},
};

use dirs_next::{cache_dir, home_dir};
use sha2::{Digest, Sha256};

use super::layout::{interpreter_relative_path, scripts_dir_name};

/// Fixed child name of a project-local environment.
pub const PROJECT_ENV_DIR: &str = ".venv";

/// Hidden directory inside the environment that holds pywrap's own records.
pub const STATE_DIR_NAME: &str = ".pywrap";

const PROJECT_ID_HASH_LEN: usize = 16;
const PROJECT_ID_NAME_MAX: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlacementMode {
    #[default]
    ProjectLocal,
    SharedCache,
}

impl PlacementMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlacementMode::ProjectLocal => "project",
            PlacementMode::SharedCache => "cache",
        }
    }

    /// Accepts the spellings used by `PYWRAP_VENV_MODE`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "project" | "local" | "project-local" => Some(PlacementMode::ProjectLocal),
            "cache" | "shared" | "shared-cache" => Some(PlacementMode::SharedCache),
            _ => None,
        }
    }
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub root: PathBuf,
    pub placement: PlacementMode,
    pub path: PathBuf,
}

impl EnvironmentSpec {
    /// Derives the environment directory for `root`. `cache_root` only matters
    /// for [`PlacementMode::SharedCache`]; `None` selects [`default_cache_root`].
    #[must_use]
    pub fn resolve(root: &Path, placement: PlacementMode, cache_root: Option<&Path>) -> Self {
        let path = match placement {
            PlacementMode::ProjectLocal => root.join(PROJECT_ENV_DIR),
            PlacementMode::SharedCache => {
                let base = cache_root.map_or_else(default_cache_root, Path::to_path_buf);
                base.join(stable_project_id(root))
            }
        };
        Self {
            root: root.to_path_buf(),
            placement,
            path,
        }
    }

    /// Lock file next to the environment, in its parent directory. Creating or
    /// deleting the environment never touches it.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        self.path.join(scripts_dir_name())
    }

    #[must_use]
    pub fn interpreter(&self) -> PathBuf {
        self.path.join(interpreter_relative_path())
    }

    /// A venv counts as complete once its interpreter exists; anything less is
    /// a leftover from an interrupted creation.
    #[must_use]
    pub fn is_structurally_complete(&self) -> bool {
        self.path.is_dir() && self.interpreter().is_file()
    }
}

/// Cache slot name for a project: a readable prefix plus a hash of the
/// normalized root path, so distinct roots never share a slot.
#[must_use]
pub fn stable_project_id(root: &Path) -> String {
    let digest = Sha256::digest(root.to_string_lossy().as_bytes());
    let hash = hex::encode(digest);
    let name = root
        .file_name()
        .map(|name| sanitize_component(&name.to_string_lossy()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "project".to_string());
    format!("{name}-{}", &hash[..PROJECT_ID_HASH_LEN])
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .take(PROJECT_ID_NAME_MAX)
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Per-user default location for shared-cache environments.
#[must_use]
pub fn default_cache_root() -> PathBuf {
    if let Some(cache) = cache_dir() {
        return cache.join("pywrap").join("venvs");
    }
    if let Some(home) = home_dir() {
        return home.join(".cache").join("pywrap").join("venvs");
    }
    std::env::temp_dir().join("pywrap").join("venvs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_local_uses_fixed_child() {
        let spec = EnvironmentSpec::resolve(
            Path::new("/work/app"),
            PlacementMode::ProjectLocal,
            Some(Path::new("/ignored")),
        );
        assert_eq!(spec.path, PathBuf::from("/work/app/.venv"));
        assert_eq!(spec.lock_path(), PathBuf::from("/work/app/.venv.lock"));
    }

    #[test]
    fn shared_cache_is_keyed_by_root() {
        let cache = Path::new("/cache");
        let first = EnvironmentSpec::resolve(
            Path::new("/work/app"),
            PlacementMode::SharedCache,
            Some(cache),
        );
        let again = EnvironmentSpec::resolve(
            Path::new("/work/app"),
            PlacementMode::SharedCache,
            Some(cache),
        );
        let other = EnvironmentSpec::resolve(
            Path::new("/other/app"),
            PlacementMode::SharedCache,
            Some(cache),
        );

        assert_eq!(first.path, again.path);
        assert_ne!(first.path, other.path);
        assert!(first.path.starts_with(cache));
        let slot = first.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(slot.starts_with("app-"), "slot should keep a readable prefix: {slot}");
        assert_eq!(
            first.lock_path(),
            cache.join(format!("{slot}.lock")),
            "lock sits beside the cache slot"
        );
    }

    #[test]
    fn project_id_sanitizes_odd_names() {
        let id = stable_project_id(Path::new("/tmp/my project!"));
        let (name, hash) = id.rsplit_once('-').expect("separator");
        assert_eq!(name, "my_project_");
        assert_eq!(hash.len(), PROJECT_ID_HASH_LEN);
    }

    #[test]
    fn project_id_for_filesystem_root_has_placeholder_name() {
        let id = stable_project_id(Path::new("/"));
        assert!(id.starts_with("project-"));
    }

    #[test]
    fn placement_mode_parses_aliases() {
        assert_eq!(PlacementMode::parse("Cache"), Some(PlacementMode::SharedCache));
        assert_eq!(PlacementMode::parse("project"), Some(PlacementMode::ProjectLocal));
        assert_eq!(PlacementMode::parse("elsewhere"), None);
    }
}
