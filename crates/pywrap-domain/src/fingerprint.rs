use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dependencies::{DependencyMode, DependencySelection, CONSTRAINTS_FILE};

const FINGERPRINT_VERSION: &str = "pywrap-fingerprint-v1";

/// Optional files considered after the primary requirements file, in order.
const REQUIREMENTS_OPTIONAL_FILES: &[&str] = &[CONSTRAINTS_FILE, "requirements.lock"];

/// Optional files considered after `pyproject.toml`, in order.
const MANIFEST_OPTIONAL_FILES: &[&str] = &[
    "setup.cfg",
    "setup.py",
    "poetry.lock",
    "pdm.lock",
    "uv.lock",
];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Files that feed the fingerprint for `selection`, in hashing order. Only
/// files that exist are returned.
#[must_use]
pub fn fingerprint_files(root: &Path, selection: &DependencySelection) -> Vec<PathBuf> {
    let optional: &[&str] = match selection.mode {
        DependencyMode::Requirements => REQUIREMENTS_OPTIONAL_FILES,
        DependencyMode::ProjectManifest => MANIFEST_OPTIONAL_FILES,
        DependencyMode::None => return Vec::new(),
    };
    let mut files = Vec::with_capacity(optional.len() + 1);
    if let Some(primary) = &selection.primary {
        if primary.is_file() {
            files.push(primary.clone());
        }
    }
    for name in optional {
        let path = root.join(name);
        if path.is_file() && !files.contains(&path) {
            files.push(path);
        }
    }
    files
}

/// Hashes the base interpreter identity, the dependency mode, and the
/// contents of every file from [`fingerprint_files`].
pub fn compute_fingerprint(
    interpreter: &str,
    root: &Path,
    selection: &DependencySelection,
) -> Result<Fingerprint> {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_VERSION.as_bytes());
    hasher.update(b"\n");
    hasher.update(b"interpreter\0");
    hasher.update(interpreter.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(b"mode\0");
    hasher.update(selection.mode.as_str().as_bytes());
    hasher.update(b"\n");

    for path in fingerprint_files(root, selection) {
        let contents =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let label = path
            .strip_prefix(root)
            .map_or_else(|_| path.display().to_string(), |rel| rel.display().to_string());
        hasher.update(b"file\0");
        hasher.update(label.replace('\\', "/").as_bytes());
        hasher.update(b"\0");
        hasher.update(contents.len().to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(&contents);
        hasher.update(b"\n");
    }

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}
