//! Dependency mode selection.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const DEFAULT_REQUIREMENTS_FILE: &str = "requirements.txt";
pub const PROJECT_MANIFEST_FILE: &str = "pyproject.toml";
/// Passed to the installer with `-c` in requirements mode when present.
pub const CONSTRAINTS_FILE: &str = "constraints.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyMode {
    #[serde(rename = "requirements")]
    Requirements,
    #[serde(rename = "pyproject")]
    ProjectManifest,
    #[serde(rename = "none")]
    None,
}

impl DependencyMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyMode::Requirements => "requirements",
            DependencyMode::ProjectManifest => "pyproject",
            DependencyMode::None => "none",
        }
    }

    /// Parses an explicit mode. `Ok(None)` means auto-detect.
    pub fn parse_override(raw: &str) -> Result<Option<Self>, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(None),
            "requirements" | "req" | "requirements.txt" => Ok(Some(DependencyMode::Requirements)),
            "pyproject" | "project" | "manifest" | "pyproject.toml" => {
                Ok(Some(DependencyMode::ProjectManifest))
            }
            "none" | "off" => Ok(Some(DependencyMode::None)),
            other => Err(format!(
                "unknown dependency mode `{other}` (expected auto, requirements, pyproject, none)"
            )),
        }
    }
}

impl fmt::Display for DependencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a mode was chosen; only used for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionSource {
    Explicit,
    RequirementsOverride,
    RequirementsFile,
    ProjectManifest,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencySelection {
    pub mode: DependencyMode,
    /// Primary declaration file for the mode. May not exist on disk.
    pub primary: Option<PathBuf>,
    pub source: SelectionSource,
}

/// Precedence: explicit mode, then a requirements override, then a
/// requirements file in the root, then the project manifest, then none.
#[must_use]
pub fn select_dependency_mode(
    root: &Path,
    explicit: Option<DependencyMode>,
    requirements_override: Option<&Path>,
) -> DependencySelection {
    let requirements = requirements_override.map_or_else(
        || root.join(DEFAULT_REQUIREMENTS_FILE),
        |path| root.join(path),
    );
    let manifest = root.join(PROJECT_MANIFEST_FILE);

    let (mode, source) = match explicit {
        Some(mode) => (mode, SelectionSource::Explicit),
        None if requirements_override.is_some() => (
            DependencyMode::Requirements,
            SelectionSource::RequirementsOverride,
        ),
        None if requirements.is_file() => (
            DependencyMode::Requirements,
            SelectionSource::RequirementsFile,
        ),
        None if manifest.is_file() => (
            DependencyMode::ProjectManifest,
            SelectionSource::ProjectManifest,
        ),
        None => (DependencyMode::None, SelectionSource::Default),
    };

    let primary = match mode {
        DependencyMode::Requirements => Some(requirements),
        DependencyMode::ProjectManifest => Some(manifest),
        DependencyMode::None => None,
    };
    DependencySelection {
        mode,
        primary,
        source,
    }
}
