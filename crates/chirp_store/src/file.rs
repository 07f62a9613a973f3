//! File-based session store.

use crate::error::{StoreError, StoreResult};
use crate::store::SessionStore;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A session store persisted as a JSON object in a single file.
///
/// Data survives process restarts, and several processes may share the
/// same file (for example a long-running `watch` and a one-shot command).
///
/// # Durability
///
/// Every write replaces the file atomically: the new contents go to a
/// sibling `.tmp` file which is synced and then renamed over the target.
/// Readers never observe a half-written file.
///
/// # Locking
///
/// An advisory lock on a sibling `.lock` file serializes access across
/// processes (shared for reads, exclusive for read-modify-write). Within
/// the process a mutex does the same.
///
/// # Example
///
/// ```no_run
/// use chirp_store::{SessionStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("session.json")).unwrap();
/// store.set("token", "abc").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    /// Opens or creates a store at `path`, creating parent directories.
    ///
    /// The file itself is only created by the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the existing
    /// file is not a JSON object of strings.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path: path.to_path_buf(),
            lock_path: sibling(path, "lock"),
            guard: Mutex::new(()),
        };

        // Fail early on a corrupted file rather than on first use.
        store.locked(false, |s| s.read_map().map(|_| ()))?;
        Ok(store)
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn locked<T>(&self, exclusive: bool, f: impl FnOnce(&Self) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.guard.lock();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;

        if exclusive {
            FileExt::lock_exclusive(&lock_file)?;
        } else {
            FileExt::lock_shared(&lock_file)?;
        }

        let result = f(self);
        // Also released when the handle drops.
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn read_map(&self) -> StoreResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&text).map_err(|e| {
            StoreError::Corrupted(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec_pretty(map).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let temp_path = sibling(&self.path, "tmp");
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(&bytes)?;
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> StoreResult<()> {
        self.locked(true, |s| {
            let mut map = s.read_map()?;
            f(&mut map);
            s.write_map(&map)
        })
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.locked(false, |s| Ok(s.read_map()?.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.update(|map| {
            map.remove(key);
        })
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.locked(false, |s| Ok(s.read_map()?.into_keys().collect()))
    }
}

/// `session.json` -> `session.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
