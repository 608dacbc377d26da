use std::fs;
use std::path::{Path, PathBuf};

use which::which_in_all;

use crate::core::errors::ProvisionError;

const DEFAULT_CANDIDATES: [&str; 2] = ["python3", "python"];

/// The interpreter new environments are created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseInterpreter {
    pub path: PathBuf,
    /// Canonical path; this is what the fingerprint hashes.
    pub identity: String,
}

impl BaseInterpreter {
    fn from_path(path: PathBuf) -> Self {
        let identity = fs::canonicalize(&path)
            .unwrap_or_else(|_| path.clone())
            .display()
            .to_string();
        Self { path, identity }
    }
}

/// Resolves the base interpreter.
///
/// `requested` may be a path (absolute or relative to `cwd`) or a command
/// name looked up on `search_path`. Without it, `python3` then `python` are
/// tried. Any candidate that is the running wrapper itself is skipped, since
/// pywrap is usually installed under the name `python3`.
///
/// # Errors
/// Returns [`ProvisionError::InterpreterNotFound`] when nothing usable exists.
pub fn resolve_base_python(
    requested: Option<&str>,
    search_path: Option<&str>,
    cwd: &Path,
    wrapper_exe: Option<&Path>,
) -> Result<BaseInterpreter, ProvisionError> {
    let wrapper = wrapper_exe.and_then(|exe| fs::canonicalize(exe).ok());
    let is_wrapper = |candidate: &Path| {
        wrapper
            .as_deref()
            .is_some_and(|wrapper| fs::canonicalize(candidate).is_ok_and(|c| c == wrapper))
    };

    if let Some(requested) = requested {
        let requested = requested.trim();
        if looks_like_path(requested) {
            let path = cwd.join(requested);
            if path.is_file() && !is_wrapper(&path) {
                return Ok(BaseInterpreter::from_path(path));
            }
            return Err(ProvisionError::InterpreterNotFound {
                requested: requested.to_string(),
            });
        }
        return lookup(requested, search_path, cwd, &is_wrapper)
            .map(BaseInterpreter::from_path)
            .ok_or_else(|| ProvisionError::InterpreterNotFound {
                requested: requested.to_string(),
            });
    }

    DEFAULT_CANDIDATES
        .iter()
        .find_map(|name| lookup(name, search_path, cwd, &is_wrapper))
        .map(BaseInterpreter::from_path)
        .ok_or_else(|| ProvisionError::InterpreterNotFound {
            requested: DEFAULT_CANDIDATES.join(" or "),
        })
}

fn lookup(
    name: &str,
    search_path: Option<&str>,
    cwd: &Path,
    is_wrapper: &dyn Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let found = which_in_all(name, search_path, cwd).ok()?;
    found
        .inspect(|candidate| {
            if is_wrapper(candidate) {
                tracing::debug!(candidate = %candidate.display(), "skipping wrapper binary");
            }
        })
        .find(|candidate| !is_wrapper(candidate))
}

fn looks_like_path(raw: &str) -> bool {
    raw.contains('/') || raw.contains('\\') || Path::new(raw).is_absolute()
}
