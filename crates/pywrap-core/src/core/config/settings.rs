use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use pywrap_domain::{DependencyMode, PlacementMode};

use crate::core::errors::ProvisionError;

pub const ENV_BASE_PYTHON: &str = "PYWRAP_BASE_PYTHON";
pub const ENV_VENV_MODE: &str = "PYWRAP_VENV_MODE";
pub const ENV_CACHE_DIR: &str = "PYWRAP_CACHE_DIR";
pub const ENV_DEP_MODE: &str = "PYWRAP_DEP_MODE";
pub const ENV_REQUIREMENTS: &str = "PYWRAP_REQUIREMENTS";
pub const ENV_INSTALL_DEPS: &str = "PYWRAP_INSTALL_DEPS";
pub const ENV_FORCE_RECREATE: &str = "PYWRAP_FORCE_RECREATE";
pub const ENV_UPGRADE_PIP: &str = "PYWRAP_UPGRADE_PIP";
pub const ENV_PIP_ARGS: &str = "PYWRAP_PIP_ARGS";
pub const ENV_LOCK_TIMEOUT: &str = "PYWRAP_LOCK_TIMEOUT_SEC";
pub const ENV_LOCK_POLL: &str = "PYWRAP_LOCK_POLL_SEC";
pub const ENV_VERBOSE: &str = "PYWRAP_VERBOSE";
pub const ENV_PROJECT_ROOT: &str = "PYWRAP_PROJECT_ROOT";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_LOCK_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Captures every variable whose name and value are valid UTF-8.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        }
    }

    /// Value of `key`; empty values count as unset.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[must_use]
    pub fn flag(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.var(key) else {
            return default;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                tracing::warn!(key, value = other, default, "unrecognized flag value; using default");
                default
            }
        }
    }

    fn seconds(&self, key: &str, default: Duration) -> Duration {
        let Some(raw) = self.var(key) else {
            return default;
        };
        match raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        {
            Some(duration) => duration,
            None => {
                tracing::warn!(key, value = raw, ?default, "invalid duration; using default");
                default
            }
        }
    }

    #[must_use]
    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_LOCK_POLL,
        }
    }
}

/// Immutable settings for one wrapper invocation. Built once at startup and
/// handed to every component.
#[derive(Debug, Clone)]
pub struct WrapperConfig {
    pub base_python: Option<String>,
    pub placement: PlacementMode,
    pub cache_root: Option<PathBuf>,
    /// `None` means auto-detect from the project root.
    pub dependency_mode: Option<DependencyMode>,
    pub requirements: Option<PathBuf>,
    pub install_deps: bool,
    pub force_recreate: bool,
    pub upgrade_packaging: bool,
    pub pip_args: Vec<String>,
    pub lock: LockSettings,
    pub verbose: bool,
    pub project_root: Option<PathBuf>,
    /// Working directory at startup; `None` if it could not be determined.
    pub cwd: Option<PathBuf>,
    /// `PATH` inherited from the caller, used for interpreter lookup and delegation.
    pub search_path: Option<String>,
    /// The running wrapper binary, skipped during interpreter discovery.
    pub wrapper_exe: Option<PathBuf>,
}

impl WrapperConfig {
    /// Builds the configuration from the current process environment.
    ///
    /// # Errors
    /// Returns [`ProvisionError::InvalidConfig`] for unrecognized mode values.
    pub fn from_env() -> Result<Self, ProvisionError> {
        let snapshot = EnvSnapshot::capture();
        let mut config = Self::from_snapshot(&snapshot, env::current_dir().ok())?;
        config.wrapper_exe = env::current_exe().ok();
        Ok(config)
    }

    /// # Errors
    /// Returns [`ProvisionError::InvalidConfig`] for unrecognized mode values.
    pub fn from_snapshot(
        snapshot: &EnvSnapshot,
        cwd: Option<PathBuf>,
    ) -> Result<Self, ProvisionError> {
        let placement = match snapshot.var(ENV_VENV_MODE) {
            Some(raw) => PlacementMode::parse(raw).ok_or_else(|| ProvisionError::InvalidConfig {
                key: ENV_VENV_MODE,
                value: raw.to_string(),
                reason: "expected `project` or `cache`".to_string(),
            })?,
            None => PlacementMode::default(),
        };
        let dependency_mode = match snapshot.var(ENV_DEP_MODE) {
            Some(raw) => {
                DependencyMode::parse_override(raw).map_err(|reason| {
                    ProvisionError::InvalidConfig {
                        key: ENV_DEP_MODE,
                        value: raw.to_string(),
                        reason,
                    }
                })?
            }
            None => None,
        };
        let pip_args = snapshot
            .var(ENV_PIP_ARGS)
            .map(|raw| raw.split_whitespace().map(ToOwned::to_owned).collect())
            .unwrap_or_default();

        Ok(Self {
            base_python: snapshot.var(ENV_BASE_PYTHON).map(ToOwned::to_owned),
            placement,
            cache_root: snapshot.var(ENV_CACHE_DIR).map(|raw| absolutize(raw, cwd.as_ref())),
            dependency_mode,
            requirements: snapshot.var(ENV_REQUIREMENTS).map(PathBuf::from),
            install_deps: snapshot.flag(ENV_INSTALL_DEPS, false),
            force_recreate: snapshot.flag(ENV_FORCE_RECREATE, false),
            upgrade_packaging: snapshot.flag(ENV_UPGRADE_PIP, true),
            pip_args,
            lock: LockSettings {
                timeout: snapshot.seconds(ENV_LOCK_TIMEOUT, DEFAULT_LOCK_TIMEOUT),
                poll_interval: snapshot.seconds(ENV_LOCK_POLL, DEFAULT_LOCK_POLL),
            },
            verbose: snapshot.flag(ENV_VERBOSE, false),
            project_root: snapshot
                .var(ENV_PROJECT_ROOT)
                .map(|raw| absolutize(raw, cwd.as_ref())),
            cwd,
            search_path: snapshot.var("PATH").map(ToOwned::to_owned),
            wrapper_exe: None,
        })
    }
}

fn absolutize(raw: &str, cwd: Option<&PathBuf>) -> PathBuf {
    let path = PathBuf::from(raw);
    match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> WrapperConfig {
        WrapperConfig::from_snapshot(&EnvSnapshot::testing(pairs), Some(PathBuf::from("/work")))
            .expect("config")
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]);
        assert_eq!(config.placement, PlacementMode::ProjectLocal);
        assert_eq!(config.dependency_mode, None);
        assert!(!config.install_deps);
        assert!(!config.force_recreate);
        assert!(config.upgrade_packaging);
        assert!(config.pip_args.is_empty());
        assert_eq!(config.lock, LockSettings::default());
        assert!(!config.verbose);
        assert!(config.cache_root.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            (ENV_BASE_PYTHON, "/opt/python/bin/python3"),
            (ENV_VENV_MODE, "cache"),
            (ENV_CACHE_DIR, "envs"),
            (ENV_DEP_MODE, "requirements"),
            (ENV_REQUIREMENTS, "deps/dev.txt"),
            (ENV_INSTALL_DEPS, "1"),
            (ENV_FORCE_RECREATE, "yes"),
            (ENV_UPGRADE_PIP, "0"),
            (ENV_PIP_ARGS, "--no-index  --find-links ./wheels"),
            (ENV_LOCK_TIMEOUT, "1.5"),
            (ENV_LOCK_POLL, "0.01"),
            (ENV_VERBOSE, "true"),
        ]);
        assert_eq!(config.base_python.as_deref(), Some("/opt/python/bin/python3"));
        assert_eq!(config.placement, PlacementMode::SharedCache);
        assert_eq!(config.cache_root, Some(PathBuf::from("/work").join("envs")));
        assert_eq!(config.dependency_mode, Some(DependencyMode::Requirements));
        assert_eq!(config.requirements, Some(PathBuf::from("deps/dev.txt")));
        assert!(config.install_deps);
        assert!(config.force_recreate);
        assert!(!config.upgrade_packaging);
        assert_eq!(config.pip_args, ["--no-index", "--find-links", "./wheels"]);
        assert_eq!(config.lock.timeout, Duration::from_millis(1500));
        assert_eq!(config.lock.poll_interval, Duration::from_millis(10));
        assert!(config.verbose);
    }

    #[test]
    fn auto_dependency_mode_is_none_override() {
        let config = config(&[(ENV_DEP_MODE, "auto")]);
        assert_eq!(config.dependency_mode, None);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = config(&[(ENV_LOCK_TIMEOUT, "soon"), (ENV_LOCK_POLL, "-1")]);
        assert_eq!(config.lock, LockSettings::default());
    }

    #[test]
    fn empty_values_are_unset() {
        let config = config(&[(ENV_UPGRADE_PIP, ""), (ENV_BASE_PYTHON, "  ")]);
        assert!(config.upgrade_packaging);
        assert!(config.base_python.is_none());
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let err = WrapperConfig::from_snapshot(
            &EnvSnapshot::testing(&[(ENV_VENV_MODE, "docker")]),
            None,
        )
        .unwrap_err();
        assert_eq!(err.stage(), "config");

        let err = WrapperConfig::from_snapshot(
            &EnvSnapshot::testing(&[(ENV_DEP_MODE, "conda")]),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_DEP_MODE));
    }
}
