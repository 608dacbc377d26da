use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

/// Files or directories whose presence marks a project root, in priority order.
pub const PROJECT_MARKERS: &[&str] = &[
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "setup.cfg",
    ".git",
    ".hg",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootSource {
    /// An ancestor (or the start itself) carried this marker.
    Marker(String),
    /// No marker anywhere above the start directory.
    Fallback,
    /// Supplied by the caller; discovery was skipped.
    Explicit,
}

impl fmt::Display for RootSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootSource::Marker(name) => write!(f, "marker:{name}"),
            RootSource::Fallback => f.write_str("fallback"),
            RootSource::Explicit => f.write_str("explicit"),
        }
    }
}

/// Absolute, normalized project root. Resolved once per invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRoot {
    path: PathBuf,
    source: RootSource,
}

impl ProjectRoot {
    #[must_use]
    pub fn new(path: impl AsRef<Path>, source: RootSource) -> Self {
        Self {
            path: normalize(path.as_ref()),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &RootSource {
        &self.source
    }
}

/// Walks from `start` up to the filesystem root and returns the first
/// directory holding any of `markers`, together with the marker that matched.
pub fn discover_project_root(start: &Path, markers: &[&str]) -> Option<(PathBuf, String)> {
    let mut dir = start.to_path_buf();
    loop {
        for marker in markers {
            if dir.join(marker).exists() {
                return Some((dir, (*marker).to_string()));
            }
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Discovery with the cwd fallback applied: a start directory with no marked
/// ancestor is itself the root.
pub fn resolve_project_root(start: &Path, markers: &[&str]) -> ProjectRoot {
    match discover_project_root(start, markers) {
        Some((dir, marker)) => {
            tracing::debug!(root = %dir.display(), %marker, "project root discovered");
            ProjectRoot::new(dir, RootSource::Marker(marker))
        }
        None => {
            tracing::debug!(
                start = %start.display(),
                "no project marker found; using start directory as root"
            );
            ProjectRoot::new(start, RootSource::Fallback)
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
