//! Folder layout and moves between folders.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::lock::{clear_locks_in, lock_unique, msg_lock, msg_unlock};

/// Extension of message files.
pub const MESSAGE_EXT: &str = "json";

/// Standard message folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Folder {
    Inbox,
    Outbox,
    Sent,
    Trash,
}

impl Folder {
    pub const ALL: [Folder; 4] = [Folder::Inbox, Folder::Outbox, Folder::Sent, Folder::Trash];

    /// Directory name under the store root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Folder::Inbox => "Inbox",
            Folder::Outbox => "Outbox",
            Folder::Sent => "Sent",
            Folder::Trash => "Trash",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A message store rooted at one directory.
#[derive(Debug, Clone)]
pub struct MessageStore {
    root: PathBuf,
}

impl MessageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store, creating any missing folders.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self::new(root);
        store.ensure()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every folder that does not exist yet.
    pub fn ensure(&self) -> StoreResult<()> {
        for folder in Folder::ALL {
            let dir = self.folder_path(folder);
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn folder_path(&self, folder: Folder) -> PathBuf {
        self.root.join(folder.dir_name())
    }

    /// Message files in `folder`, sorted by file name. Lock files are not
    /// listed.
    pub fn list_folder(&self, folder: Folder) -> StoreResult<Vec<PathBuf>> {
        let dir = self.folder_path(folder);
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            let is_msg = path.extension().is_some_and(|ext| ext == MESSAGE_EXT);
            let hidden = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            if is_msg && !hidden {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Move a message file into `folder` and return its new location.
    ///
    /// The destination name is locked for the duration of the move so no
    /// other actor picks up a half-moved message.
    pub fn move_to_folder(&self, msg: &Path, folder: Folder) -> StoreResult<PathBuf> {
        let name = msg
            .file_name()
            .ok_or_else(|| StoreError::io(msg, std::io::ErrorKind::InvalidInput.into()))?;
        let dest = self.folder_path(folder).join(name);

        if !msg_lock(&dest)? {
            return Err(StoreError::Locked(dest));
        }
        let result = fs::rename(msg, &dest).map_err(|e| StoreError::io(msg, e));
        msg_unlock(&dest);
        result?;

        log::debug!("Moved {} to {}", msg.display(), folder);
        Ok(dest)
    }

    /// Queue a message for the router.
    pub fn move_to_outgoing(&self, msg: &Path) -> StoreResult<PathBuf> {
        self.move_to_folder(msg, Folder::Outbox)
    }

    /// A fresh, timestamped file name in the Inbox.
    pub fn new_inbox_name(&self) -> PathBuf {
        let name = chrono::Local::now().format("form_%m%d%Y_%H%M%S");
        self.folder_path(Folder::Inbox)
            .join(format!("{}.{}", name, MESSAGE_EXT))
    }

    /// A fresh Inbox name, already locked for the caller.
    ///
    /// Names only change once a second, so a second form arriving in the
    /// same second gets a `_N` suffix.
    pub fn lock_new_inbox_name(&self) -> StoreResult<PathBuf> {
        lock_unique(&self.new_inbox_name())
    }

    /// Remove leftover lock files from every folder.
    pub fn clear_all_locks(&self) -> StoreResult<usize> {
        let mut removed = 0;
        for folder in Folder::ALL {
            removed += clear_locks_in(&self.folder_path(folder))?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::msg_is_locked;

    #[test]
    fn test_open_creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path().join("msgs")).unwrap();
        for folder in Folder::ALL {
            assert!(store.folder_path(folder).is_dir());
        }
        assert!(store.folder_path(Folder::Trash).ends_with("Trash"));
    }

    #[test]
    fn test_list_folder_sorted_without_locks() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        let outbox = store.folder_path(Folder::Outbox);
        fs::write(outbox.join("b.json"), "{}").unwrap();
        fs::write(outbox.join("a.json"), "{}").unwrap();
        fs::write(outbox.join("notes.txt"), "x").unwrap();
        msg_lock(&outbox.join("a.json")).unwrap();

        let listed = store.list_folder(Folder::Outbox).unwrap();
        assert_eq!(listed, vec![outbox.join("a.json"), outbox.join("b.json")]);
    }

    #[test]
    fn test_move_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        let src = store.folder_path(Folder::Inbox).join("m.json");
        fs::write(&src, "{}").unwrap();

        let dest = store.move_to_outgoing(&src).unwrap();
        assert_eq!(dest, store.folder_path(Folder::Outbox).join("m.json"));
        assert!(dest.exists());
        assert!(!src.exists());
        assert!(!msg_is_locked(&dest));
    }

    #[test]
    fn test_move_refused_when_destination_locked() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        let src = store.folder_path(Folder::Inbox).join("m.json");
        fs::write(&src, "{}").unwrap();
        let dest = store.folder_path(Folder::Trash).join("m.json");
        msg_lock(&dest).unwrap();

        assert!(matches!(
            store.move_to_folder(&src, Folder::Trash),
            Err(StoreError::Locked(_))
        ));
        assert!(src.exists());
    }

    #[test]
    fn test_new_inbox_name_and_clear_locks() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        let name = store.new_inbox_name();
        let file = name.file_name().unwrap().to_string_lossy().to_string();
        assert!(file.starts_with("form_"));
        assert!(file.ends_with(".json"));
        assert_eq!(file.len(), "form_01012024_120000.json".len());

        msg_lock(&name).unwrap();
        msg_lock(&store.folder_path(Folder::Outbox).join("x.json")).unwrap();
        assert_eq!(store.clear_all_locks().unwrap(), 2);
    }
}
