// <env>/.pywrap/ok.json persistence.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pywrap_domain::{DependencyMode, Fingerprint, STATE_DIR_NAME};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const STATE_FILE_NAME: &str = "ok.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionStatus {
    Ok,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionState {
    pub fingerprint: Fingerprint,
    pub status: ProvisionStatus,
    pub last_verified_at: String,
    #[serde(default)]
    pub base_python: String,
    #[serde(default)]
    pub dep_mode: Option<DependencyMode>,
    #[serde(default)]
    pub dependencies_installed: bool,
    #[serde(default)]
    pub pip_args: Vec<String>,
    #[serde(default)]
    pub wrapper_version: String,
}

#[must_use]
pub fn state_path(env_dir: &Path) -> PathBuf {
    env_dir.join(STATE_DIR_NAME).join(STATE_FILE_NAME)
}

/// Reads the record for `env_dir`. Missing, unreadable, and corrupt records
/// all come back as `None`: the caller treats each as stale.
#[must_use]
pub fn load_state(env_dir: &Path) -> Option<ProvisionState> {
    let path = state_path(env_dir);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "state unreadable; treating as missing");
            return None;
        }
    };
    match serde_json::from_str::<ProvisionState>(&contents) {
        Ok(state) if !state.fingerprint.as_str().trim().is_empty() => Some(state),
        Ok(_) => {
            tracing::debug!(path = %path.display(), "state has no fingerprint; treating as missing");
            None
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "state corrupt; treating as missing");
            None
        }
    }
}

/// Writes the record atomically (temp file, then rename).
///
/// # Errors
/// Returns the underlying I/O error; callers decide whether it is fatal.
pub fn save_state(env_dir: &Path, state: &ProvisionState) -> io::Result<()> {
    let path = state_path(env_dir);
    let mut contents = serde_json::to_vec_pretty(state).map_err(io::Error::other)?;
    contents.push(b'\n');
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &contents)?;
    fs::rename(&tmp_path, &path)
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(status: ProvisionStatus) -> ProvisionState {
        ProvisionState {
            fingerprint: Fingerprint::from("abc123".to_string()),
            status,
            last_verified_at: now_rfc3339(),
            base_python: "/usr/bin/python3".into(),
            dep_mode: Some(DependencyMode::Requirements),
            dependencies_installed: true,
            pip_args: vec!["--no-index".into()],
            wrapper_version: crate::PYWRAP_VERSION.into(),
        }
    }

    #[test]
    fn record_lives_beside_the_environment_as_ok_json() {
        assert_eq!(
            state_path(Path::new("/work/app/.venv")),
            PathBuf::from("/work/app/.venv/.pywrap/ok.json")
        );
    }

    #[test]
    fn missing_state_is_none() {
        let temp = tempdir().expect("tempdir");
        assert_eq!(load_state(temp.path()), None);
    }

    #[test]
    fn saved_state_is_loaded_back() {
        let temp = tempdir().expect("tempdir");
        let state = sample(ProvisionStatus::Ok);
        save_state(temp.path(), &state).expect("save");

        assert_eq!(load_state(temp.path()), Some(state));
        assert!(!state_path(temp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn record_uses_documented_field_names() {
        let temp = tempdir().expect("tempdir");
        save_state(temp.path(), &sample(ProvisionStatus::Partial)).expect("save");

        let raw = fs::read_to_string(state_path(temp.path())).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["status"], "partial");
        assert_eq!(value["fingerprint"], "abc123");
        assert_eq!(value["dep_mode"], "requirements");
        assert_eq!(value["pip_args"][0], "--no-index");
        assert!(value["last_verified_at"].as_str().is_some_and(|s| s.contains('T')));
    }

    #[test]
    fn corrupt_state_is_treated_as_missing() {
        let temp = tempdir().expect("tempdir");
        let path = state_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).expect("dir");
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(load_state(temp.path()), None);

        fs::write(&path, r#"{"fingerprint":"","status":"ok","last_verified_at":"x"}"#)
            .expect("write");
        assert_eq!(load_state(temp.path()), None);
    }

    #[test]
    fn older_records_without_optional_fields_load() {
        let temp = tempdir().expect("tempdir");
        let path = state_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).expect("dir");
        fs::write(
            &path,
            r#"{"fingerprint":"f00","status":"ok","last_verified_at":"2026-01-01T00:00:00Z"}"#,
        )
        .expect("write");

        let state = load_state(temp.path()).expect("state");
        assert_eq!(state.status, ProvisionStatus::Ok);
        assert!(!state.dependencies_installed);
        assert!(state.pip_args.is_empty());
    }

    #[test]
    fn save_fails_when_state_dir_is_blocked() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join(STATE_DIR_NAME), "file in the way").expect("block");
        assert!(save_state(temp.path(), &sample(ProvisionStatus::Ok)).is_err());
    }
}
