//! Key/value storage for session records.
//!
//! Storage is eventually consistent and last-write-wins. A store that can
//! notify about changes returns a receiver from `watch`; stores that cannot
//! return `None` and callers fall back to polling.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

use crate::error::Result;

/// Durable key/value storage.
pub trait SessionStore {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Every key starting with `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Subscribe to changed keys, if the store can push them.
    fn watch(&self) -> Option<Receiver<String>> {
        None
    }
}

#[derive(Default)]
struct MemoryInner {
    values: FxHashMap<String, Vec<u8>>,
    watchers: Vec<Sender<String>>,
}

/// In-memory store with change notification.
///
/// Clones share the same data, so one `MemoryStore` can stand in for a
/// storage area several peers observe.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(inner: &mut MemoryInner, key: &str) {
        // Receivers that were dropped unsubscribe here.
        inner.watchers.retain(|tx| tx.send(key.to_string()).is_ok());
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().values.get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut inner = self.lock();
        inner.values.insert(key.to_string(), value);
        Self::notify(&mut inner, key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.values.remove(key).is_some() {
            Self::notify(&mut inner, key);
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .lock()
            .values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn watch(&self) -> Option<Receiver<String>> {
        let (tx, rx) = channel();
        self.lock().watchers.push(tx);
        Some(rx)
    }
}

/// One file per key inside a directory. No change notification.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create) the store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key.replace(':', "-")))
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        // Write-then-rename so readers never see a torn record.
        let tmp = self.dir.join(format!(".{}.tmp", key.replace(':', "-")));
        fs::write(&tmp, value)?;
        fs::rename(tmp, self.path(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".bin")) else {
                continue;
            };
            let key = stem.replacen('-', ":", 1);
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
