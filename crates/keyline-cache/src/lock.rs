//! Advisory lock serialising runs on the same derived directory.

use crate::{CacheError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock file name inside a derived directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Exclusive lock on `<dir>/.lock`, released on drop.
///
/// Works across processes; a second holder blocks until the first is gone.
#[derive(Debug)]
pub struct DerivedLock {
    file: File,
    path: PathBuf,
}

impl DerivedLock {
    /// Block until the lock for `dir` is held by this process.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| CacheError::storage(dir, e))?;
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| CacheError::storage(&path, e))?;

        if file.try_lock_exclusive().is_err() {
            info!(path = %path.display(), "Another run holds this output directory, waiting");
            file.lock_exclusive().map_err(|e| CacheError::storage(&path, e))?;
        }
        debug!(path = %path.display(), "Acquired output lock");

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DerivedLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("derived").join("abc");
        let lock = DerivedLock::acquire(&target).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path().file_name().unwrap(), LOCK_FILE_NAME);
    }

    #[test]
    fn test_second_holder_waits() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().to_path_buf();
        let released = Arc::new(AtomicBool::new(false));

        let first = DerivedLock::acquire(&target).unwrap();
        let waiter = {
            let target = target.clone();
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let _second = DerivedLock::acquire(&target).unwrap();
                released.load(Ordering::SeqCst)
            })
        };

        thread::sleep(Duration::from_millis(100));
        released.store(true, Ordering::SeqCst);
        drop(first);

        assert!(waiter.join().unwrap(), "second lock acquired before release");
    }
}
