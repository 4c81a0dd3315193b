//! Named advisory file locks
//!
//! Each team exposes a small fixed set of named locks (`messages`,
//! `events`, `acks`, `dead-letter`, `nudge-cooldown`, `state-rehydrate`).
//! Acquisition blocks until available and is released on drop, including on
//! panics that unwind through the guard. Locks are not re-entrant: a second
//! acquisition from the same process for the same name will deadlock, same
//! as any other flock-based protocol.

use crate::error::EngineError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// The fixed set of lock names used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockName {
    Messages,
    Events,
    Acks,
    DeadLetter,
    NudgeCooldown,
    StateRehydrate,
}

impl LockName {
    pub fn as_str(self) -> &'static str {
        match self {
            LockName::Messages => "messages",
            LockName::Events => "events",
            LockName::Acks => "acks",
            LockName::DeadLetter => "dead-letter",
            LockName::NudgeCooldown => "nudge-cooldown",
            LockName::StateRehydrate => "state-rehydrate",
        }
    }
}

/// Lock guard; releases the advisory lock automatically on drop.
pub struct TeamLock {
    file: File,
}

impl Drop for TeamLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquire the named lock for `team` under `locks_dir`, blocking until held.
pub fn acquire(locks_dir: &Path, team: &str, name: LockName) -> Result<TeamLock, EngineError> {
    std::fs::create_dir_all(locks_dir).map_err(|e| EngineError::io(locks_dir, e))?;
    let path: PathBuf = locks_dir.join(format!("{}.lock", name.as_str()));

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| EngineError::io(&path, e))?;

    file.lock_exclusive().map_err(|_| EngineError::LockFailed {
        team: team.to_string(),
        name: name.as_str(),
    })?;

    tracing::debug!(team, lock = name.as_str(), "acquired lock");
    Ok(TeamLock { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = acquire(dir.path(), "demo", LockName::Messages).unwrap();
        drop(lock);
        let _lock2 = acquire(dir.path(), "demo", LockName::Messages).unwrap();
    }

    #[test]
    fn second_acquirer_blocks_until_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let barrier = Arc::new(Barrier::new(2));
        let b2 = Arc::clone(&barrier);

        let handle = thread::spawn(move || {
            let _lock = acquire(&path, "demo", LockName::Messages).unwrap();
            b2.wait();
            thread::sleep(Duration::from_millis(150));
        });

        barrier.wait();
        let started = std::time::Instant::now();
        let _lock2 = acquire(dir.path(), "demo", LockName::Messages).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        handle.join().unwrap();
    }
}
