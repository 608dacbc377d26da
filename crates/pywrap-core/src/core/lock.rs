//! Cross-process exclusive lock guarding one environment directory.
//!
//! The lock is an advisory OS lock (`flock` on Unix, `LockFileEx` on Windows,
//! both via `fs4`) on a sibling `<env>.lock` file. The file's contents are
//! never read. If the holder dies the OS drops the lock, so stale locks are
//! never broken by hand.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs4::FileExt;

use crate::core::config::LockSettings;
use crate::core::errors::ProvisionError;

/// Held lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct EnvLock {
    file: File,
    path: PathBuf,
}

impl EnvLock {
    /// Single non-blocking attempt. `Ok(None)` means another holder has it.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Lock`] when the lock file cannot be opened or
    /// the OS reports something other than contention.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, ProvisionError> {
        let file = open_lock_file(path)?;
        try_lock(&file, path).map(|locked| {
            locked.then(|| Self {
                file,
                path: path.to_path_buf(),
            })
        })
    }

    /// Blocks, retrying every `poll_interval`, until the lock is ours or
    /// `timeout` has elapsed.
    ///
    /// # Errors
    /// Returns [`ProvisionError::LockTimeout`] when the window closes first.
    pub fn acquire(path: &Path, settings: LockSettings) -> Result<Self, ProvisionError> {
        let file = open_lock_file(path)?;
        let start = Instant::now();
        let mut announced = false;
        loop {
            if try_lock(&file, path)? {
                tracing::debug!(lock = %path.display(), waited = ?start.elapsed(), "lock acquired");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }
            let waited = start.elapsed();
            if waited >= settings.timeout {
                return Err(ProvisionError::LockTimeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            if !announced {
                tracing::info!(lock = %path.display(), "waiting for another pywrap process");
                announced = true;
            }
            let remaining = settings.timeout.saturating_sub(waited);
            thread::sleep(settings.poll_interval.min(remaining).max(Duration::from_millis(1)));
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Explicit release; equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for EnvLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::debug!(lock = %self.path.display(), %err, "unlock failed; closing the handle releases it");
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File, ProvisionError> {
    let lock_err = |source| ProvisionError::Lock {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(lock_err)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(lock_err)
}

fn try_lock(file: &File, path: &Path) -> Result<bool, ProvisionError> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(false),
        #[cfg(windows)]
        Err(err) if matches!(err.raw_os_error(), Some(32 | 33)) => Ok(false),
        Err(source) => Err(ProvisionError::Lock {
            path: path.to_path_buf(),
            source,
        }),
    }
}
