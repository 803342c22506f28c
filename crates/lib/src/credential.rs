//! Credential persistence: a small string key/value store that survives restarts.
//!
//! The bearer token lives under [`ACCESS_TOKEN_KEY`] in a JSON object file
//! (e.g. `~/.chatter/credentials.json`). There is no client-side expiry.

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key under which the bearer token is stored.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential store {path} is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable string key/value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    fn remove(&self, key: &str) -> Result<(), CredentialError>;
}

/// JSON-file backed store. Each access takes an exclusive lock on the file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn open_locked(&self) -> Result<File, CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.lock_exclusive().map_err(|e| self.io_err(e))?;
        Ok(file)
    }

    fn read_map(&self, file: &mut File) -> Result<BTreeMap<String, String>, CredentialError> {
        let mut s = String::new();
        file.read_to_string(&mut s).map_err(|e| self.io_err(e))?;
        if s.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&s).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_map(
        &self,
        file: &mut File,
        map: &BTreeMap<String, String>,
    ) -> Result<(), CredentialError> {
        let s = serde_json::to_string_pretty(map).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        file.seek(SeekFrom::Start(0)).map_err(|e| self.io_err(e))?;
        file.set_len(0).map_err(|e| self.io_err(e))?;
        file.write_all(s.as_bytes()).map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), CredentialError> {
        let mut file = self.open_locked()?;
        let mut map = match self.read_map(&mut file) {
            Ok(map) => map,
            Err(CredentialError::Corrupt { source, .. }) => {
                log::warn!(
                    "replacing unreadable credential store {}: {}",
                    self.path.display(),
                    source
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut map);
        let res = self.write_map(&mut file, &map);
        let _ = FileExt::unlock(&file);
        res
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut file = self.open_locked()?;
        let map = self.read_map(&mut file);
        let _ = FileExt::unlock(&file);
        Ok(map?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.update(|m| {
            m.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|m| {
            m.remove(key);
        })
    }
}

/// In-process store; nothing survives the process. Used by tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(g.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.remove(key);
        Ok(())
    }
}

/// Bearer token persistence on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Stored token, if any. Blank values and an unreadable store count as absent.
    pub fn load(&self) -> Result<Option<String>, CredentialError> {
        let token = match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token,
            Err(e @ CredentialError::Corrupt { .. }) => {
                log::warn!("ignoring stored credential: {}", e);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    pub fn save(&self, token: &str) -> Result<(), CredentialError> {
        self.store.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<(), CredentialError> {
        self.store.remove(ACCESS_TOKEN_KEY)
    }
}
