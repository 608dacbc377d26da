use std::fs;
use std::io;
use std::path::Path;

/// Removes `path` whatever it is. A missing path is not an error; a symlink is
/// unlinked rather than followed.
pub(crate) fn remove_dir_all_writable(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if meta.file_type().is_symlink() || meta.is_file() {
        return fs::remove_file(path);
    }
    grant_owner_write(path);
    fs::remove_dir_all(path)
}

// Installers leave read-only files and directories behind. Walks the tree
// without following symlinks; failures surface later from remove_dir_all.
fn grant_owner_write(root: &Path) {
    let mut pending = vec![root.to_path_buf()];
    while let Some(path) = pending.pop() {
        let Ok(meta) = fs::symlink_metadata(&path) else {
            continue;
        };
        if meta.file_type().is_symlink() {
            continue;
        }
        if let Some(perms) = writable(&meta) {
            let _ = fs::set_permissions(&path, perms);
        }
        if meta.is_dir() {
            if let Ok(entries) = fs::read_dir(&path) {
                pending.extend(entries.flatten().map(|entry| entry.path()));
            }
        }
    }
}

#[cfg(unix)]
fn writable(meta: &fs::Metadata) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    let wanted = mode | if meta.is_dir() { 0o700 } else { 0o600 };
    (wanted != mode).then(|| fs::Permissions::from_mode(wanted))
}

#[cfg(not(unix))]
fn writable(meta: &fs::Metadata) -> Option<fs::Permissions> {
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return None;
    }
    perms.set_readonly(false);
    Some(perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_path_is_ok() {
        let temp = tempdir().expect("tempdir");
        remove_dir_all_writable(&temp.path().join("absent")).expect("noop");
    }

    #[test]
    fn removes_read_only_tree() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("venv");
        let nested = root.join("lib").join("site-packages");
        fs::create_dir_all(&nested).expect("nested");
        let file = nested.join("mod.py");
        fs::write(&file, "x = 1\n").expect("file");
        let mut perms = fs::metadata(&file).expect("meta").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).expect("readonly");

        remove_dir_all_writable(&root).expect("remove");
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn removes_tree_under_read_only_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("venv");
        let locked = root.join("share");
        fs::create_dir_all(&locked).expect("dir");
        fs::write(locked.join("data.txt"), "x").expect("file");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).expect("chmod");

        remove_dir_all_writable(&root).expect("remove");
        assert!(!root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_unlinked_not_followed() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("real");
        fs::create_dir_all(&target).expect("target");
        fs::write(target.join("keep.txt"), "keep").expect("file");
        let link = temp.path().join("venv");
        std::os::unix::fs::symlink(&target, &link).expect("symlink");

        remove_dir_all_writable(&link).expect("remove");
        assert!(!link.exists());
        assert!(target.join("keep.txt").is_file());
    }

    #[test]
    fn stray_file_in_place_of_directory_is_removed() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("venv");
        fs::write(&root, "not a directory").expect("file");

        remove_dir_all_writable(&root).expect("remove");
        assert!(!root.exists());
    }
}
