//! # Block Directory Lock
//!
//! One writer per blocks directory. The `LOCK` file carries an `fs2`
//! exclusive lock plus the holder's PID, so a second process can report who
//! owns the directory. The kernel drops the lock when its holder exits, so a
//! file left behind by a crash is simply locked again.
//!
//! The file is never unlinked: a contender that opened it before release
//! must contend for the same inode as every later opener.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

const LOCK_FILE: &str = "LOCK";

/// Pause between acquisition attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Cannot open lock file {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Blocks directory {} is held{}", .path.display(), .holder.map(|pid| format!(" by process {pid}")).unwrap_or_default())]
    Held { path: PathBuf, holder: Option<u32> },

    #[error("Cannot record owner in lock file: {0}")]
    Record(io::Error),
}

/// Exclusive hold on a blocks directory, released on drop.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Take the lock on `dir`, polling until `timeout` runs out.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        let deadline = Instant::now() + timeout;

        loop {
            // Opened without truncation so a holder's PID survives our attempt.
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|source| LockError::Open {
                    path: path.clone(),
                    source,
                })?;

            if file.try_lock_exclusive().is_ok() {
                return Self::claim(file, path);
            }
            drop(file);

            let now = Instant::now();
            if now >= deadline {
                let holder = read_holder(&path);
                return Err(LockError::Held { path, holder });
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    fn claim(mut file: File, path: PathBuf) -> Result<Self, LockError> {
        file.set_len(0).map_err(LockError::Record)?;
        writeln!(file, "{}", std::process::id()).map_err(LockError::Record)?;
        file.sync_all().map_err(LockError::Record)?;
        tracing::debug!("[block-store] 🔒 Locked {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = self.file.unlock();
    }
}

fn read_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_records_owner_pid() {
        let dir = tempfile::tempdir().unwrap();
        let lock = DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap();

        assert_eq!(read_holder(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn second_acquire_times_out_naming_holder() {
        let dir = tempfile::tempdir().unwrap();
        let _held = DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap();

        let started = Instant::now();
        match DirectoryLock::acquire(dir.path(), Duration::from_millis(100)) {
            Err(LockError::Held { holder, .. }) => assert_eq!(holder, Some(std::process::id())),
            other => panic!("expected Held, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn drop_releases_but_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap());

        assert!(dir.path().join(LOCK_FILE).exists());
        DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap();
    }

    #[test]
    fn released_lock_admits_a_single_contender() {
        let dir = tempfile::tempdir().unwrap();
        let first = DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap();
        let early = OpenOptions::new()
            .read(true)
            .write(true)
            .open(first.path())
            .unwrap();
        drop(first);

        early.try_lock_exclusive().unwrap();
        assert!(matches!(
            DirectoryLock::acquire(dir.path(), Duration::from_millis(50)),
            Err(LockError::Held { .. })
        ));
    }

    #[test]
    fn leftover_file_without_holder_is_relocked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "4294967294\n").unwrap();

        let lock = DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap();
        assert_eq!(read_holder(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn live_holder_is_kept_whatever_pid_it_records() {
        let dir = tempfile::tempdir().unwrap();
        let held = DirectoryLock::acquire(dir.path(), Duration::ZERO).unwrap();
        fs::write(held.path(), "4294967294\n").unwrap();

        match DirectoryLock::acquire(dir.path(), Duration::from_millis(50)) {
            Err(LockError::Held { holder, .. }) => assert_eq!(holder, Some(4_294_967_294)),
            other => panic!("expected Held, got {other:?}"),
        }
        assert_eq!(read_holder(held.path()), Some(4_294_967_294));
    }
}
