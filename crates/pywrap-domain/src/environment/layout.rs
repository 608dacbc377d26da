use std::path::PathBuf;

/// Directory holding the interpreter and console scripts inside a venv.
#[must_use]
pub fn scripts_dir_name() -> &'static str {
    if cfg!(windows) {
        "Scripts"
    } else {
        "bin"
    }
}

/// Interpreter location relative to the venv directory.
#[must_use]
pub fn interpreter_relative_path() -> PathBuf {
    let exe = if cfg!(windows) { "python.exe" } else { "python" };
    PathBuf::from(scripts_dir_name()).join(exe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreter_lives_in_scripts_dir() {
        let rel = interpreter_relative_path();
        assert!(rel.starts_with(scripts_dir_name()));
        assert_eq!(rel.components().count(), 2);
    }
}
