//! Sidecar lock files.
//!
//! A message `dir/name` is owned by whoever created `dir/.lock.name`. The
//! lock file is created with exclusive-create semantics so two actors racing
//! for the same message cannot both succeed, whether they are threads of this
//! process or separate gateway processes working the same directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Prefix of lock file names.
pub const LOCK_PREFIX: &str = ".lock.";

/// Lock file guarding `msg`.
pub fn lock_path(msg: &Path) -> PathBuf {
    let name = msg
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    msg.with_file_name(format!("{}{}", LOCK_PREFIX, name))
}

/// Whether `msg` is currently locked.
pub fn msg_is_locked(msg: &Path) -> bool {
    lock_path(msg).exists()
}

/// Try to take the lock on `msg`.
///
/// Returns `Ok(false)` if another owner holds it.
pub fn msg_lock(msg: &Path) -> StoreResult<bool> {
    let lock = lock_path(msg);
    match OpenOptions::new().write(true).create_new(true).open(&lock) {
        Ok(file) => {
            record_owner(&lock, file)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let owner = fs::read_to_string(&lock).unwrap_or_default();
            log::debug!("{} is locked by {}", msg.display(), owner.trim());
            Ok(false)
        }
        Err(e) => Err(StoreError::io(&lock, e)),
    }
}

/// Write the owner line into a freshly created lock. On failure the lock
/// is removed again.
fn record_owner(lock: &Path, mut file: impl Write) -> StoreResult<()> {
    let owner = format!(
        "pid {} thread {} at {}\n",
        std::process::id(),
        std::thread::current().name().unwrap_or("unnamed"),
        chrono::Utc::now().to_rfc3339()
    );
    if let Err(e) = file.write_all(owner.as_bytes()) {
        drop(file);
        if let Err(rm) = fs::remove_file(lock) {
            log::warn!("Unable to remove half-made lock {}: {}", lock.display(), rm);
        }
        return Err(StoreError::io(lock, e));
    }
    Ok(())
}

/// Most `_N` suffixes [`lock_unique`] tries.
pub const UNIQUE_NAME_ATTEMPTS: usize = 100;

/// Lock a name derived from `base` that no one else owns and that does not
/// exist yet: `base` itself, then `stem_1.ext`, `stem_2.ext`, ...
///
/// Fails with [`StoreError::Locked`] when every candidate is taken.
pub fn lock_unique(base: &Path) -> StoreResult<PathBuf> {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 0..UNIQUE_NAME_ATTEMPTS {
        let candidate = if n == 0 {
            base.to_path_buf()
        } else {
            base.with_file_name(format!("{}_{}{}", stem, n, ext))
        };
        if !msg_lock(&candidate)? {
            continue;
        }
        if candidate.exists() {
            msg_unlock(&candidate);
            continue;
        }
        return Ok(candidate);
    }
    Err(StoreError::Locked(base.to_path_buf()))
}

/// Release the lock on `msg`. Returns false if it was not held.
pub fn msg_unlock(msg: &Path) -> bool {
    match fs::remove_file(lock_path(msg)) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Unable to unlock {}: {}", msg.display(), e);
            false
        }
    }
}

/// Remove every lock file in `dir`. Returns how many were removed.
pub fn clear_locks_in(dir: &Path) -> StoreResult<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(LOCK_PREFIX) {
            fs::remove_file(entry.path()).map_err(|e| StoreError::io(entry.path(), e))?;
            log::info!("Removed stale lock {}", entry.path().display());
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/store/Outbox/msg1.json")),
            PathBuf::from("/store/Outbox/.lock.msg1.json")
        );
    }

    #[test]
    fn test_lock_twice() {
        let dir = tempfile::tempdir().unwrap();
        let msg = dir.path().join("a.json");

        assert!(!msg_is_locked(&msg));
        assert!(msg_lock(&msg).unwrap());
        assert!(!msg_lock(&msg).unwrap());
        assert!(msg_is_locked(&msg));

        assert!(msg_unlock(&msg));
        assert!(!msg_is_locked(&msg));
        assert!(!msg_unlock(&msg));
    }

    #[test]
    fn test_lock_records_owner() {
        let dir = tempfile::tempdir().unwrap();
        let msg = dir.path().join("a.json");
        msg_lock(&msg).unwrap();
        let owner = fs::read_to_string(lock_path(&msg)).unwrap();
        assert!(owner.starts_with(&format!("pid {}", std::process::id())));
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_owner_write_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let msg = dir.path().join("a.json");
        let lock = lock_path(&msg);
        fs::write(&lock, "").unwrap();

        assert!(matches!(record_owner(&lock, BrokenWriter), Err(StoreError::Io { .. })));
        assert!(!msg_is_locked(&msg));
        assert!(msg_lock(&msg).unwrap());
    }

    #[test]
    fn test_lock_unique_skips_owned_and_existing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("form.json");
        assert!(msg_lock(&base).unwrap());
        fs::write(dir.path().join("form_1.json"), "{}").unwrap();

        let got = lock_unique(&base).unwrap();
        assert_eq!(got, dir.path().join("form_2.json"));
        assert!(msg_is_locked(&got));
        // Neither the foreign lock nor the existing file was touched.
        assert!(msg_is_locked(&base));
        assert!(!msg_is_locked(&dir.path().join("form_1.json")));
        assert_eq!(fs::read_to_string(dir.path().join("form_1.json")).unwrap(), "{}");
    }

    #[test]
    fn test_lock_unique_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("form.json");
        assert!(msg_lock(&base).unwrap());
        for n in 1..UNIQUE_NAME_ATTEMPTS {
            assert!(msg_lock(&dir.path().join(format!("form_{}.json", n))).unwrap());
        }
        assert!(matches!(lock_unique(&base), Err(StoreError::Locked(p)) if p == base));
    }

    #[test]
    fn test_clear_locks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.json"), "{}").unwrap();
        msg_lock(&dir.path().join("a.json")).unwrap();
        msg_lock(&dir.path().join("b.json")).unwrap();

        assert_eq!(clear_locks_in(dir.path()).unwrap(), 2);
        assert!(dir.path().join("keep.json").exists());
        assert_eq!(clear_locks_in(&dir.path().join("missing")).unwrap(), 0);
    }
}
