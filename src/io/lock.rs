use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Advisory lock serializing writers of one store file.
///
/// Uses platform-native flock (Unix), so a crashed holder never leaves the
/// store locked.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not acquire lock on {path}: another cbx process may be writing")]
    Timeout { path: PathBuf },
}

impl FileLock {
    /// Lock file used for a given data file: `board.json` → `board.json.lock`
    pub fn path_for(data_path: &Path) -> PathBuf {
        let mut name = data_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        data_path.with_file_name(name)
    }

    /// Acquire the lock guarding `data_path`, waiting up to `timeout`.
    pub fn acquire(data_path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let lock_path = Self::path_for(data_path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| LockError::CreateError {
                path: lock_path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        loop {
            match try_lock(&file) {
                Ok(()) => {
                    return Ok(FileLock {
                        _file: file,
                        path: lock_path,
                    });
                }
                Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(_) => {
                    tracing::warn!(path = %lock_path.display(), "lock wait timed out");
                    return Err(LockError::Timeout { path: lock_path });
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // flock is released with the file handle; the file itself is litter
        let _ = fs::remove_file(&self.path);
    }
}

/// Try to acquire an exclusive flock on the file (non-blocking)
#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    // advisory only off Unix
    Ok(())
}
