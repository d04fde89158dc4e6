use fs2::FileExt;
use mneme_core::{MemoryError, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock on a lock file.
/// Automatically released when dropped, on every exit path.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Poll for the lock until `timeout` elapses, then fail with `Busy`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let start = Instant::now();
        let mut contended = false;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    if contended {
                        debug!(lock = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "lock acquired after contention");
                    }
                    return Ok(Self {
                        _file: file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    contended = true;
                    if start.elapsed() >= timeout {
                        return Err(MemoryError::Busy {
                            path: path.to_path_buf(),
                            waited_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(MemoryError::Io(e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
