//! Durable slot holding the last known user.
//!
//! # Design
//! The slot is a single value per backend origin. Only `SessionManager`
//! writes it, and it does so while holding its operation lock, so store
//! implementations need no coordination of their own beyond being `Send`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use url::Url;

use crate::types::UserRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid persisted session JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Origin-scoped storage for the serialized `UserRecord`.
pub trait SessionStore: Send {
    fn load(&self) -> Result<Option<UserRecord>, StoreError>;
    fn save(&mut self, user: &UserRecord) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn load(&self) -> Result<Option<UserRecord>, StoreError> {
        (**self).load()
    }

    fn save(&mut self, user: &UserRecord) -> Result<(), StoreError> {
        (**self).save(user)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// In-process slot. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<UserRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: UserRecord) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(user))),
        }
    }

    pub fn get(&self) -> Option<UserRecord> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.get())
    }

    fn save(&mut self, user: &UserRecord) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file slot, one file per backend origin.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Slot for `base_url`'s origin inside `dir`.
    pub fn for_origin(dir: impl AsRef<Path>, base_url: &str) -> Self {
        Self::new(dir.as_ref().join(format!("session-{}.json", origin_key(base_url))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<UserRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(serde_json::from_str::<Option<UserRecord>>(&raw)?)
    }

    fn save(&mut self, user: &UserRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string(user)?;
        fs::write(&tmp, raw).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// `https://shop.example:8443/api` -> `https_shop_example_8443`. Default
/// ports are spelled out, so `https://shop.example` and
/// `https://shop.example:443` share a slot.
fn origin_key(base_url: &str) -> String {
    let raw = match Url::parse(base_url) {
        Ok(url) => format!(
            "{}_{}_{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().map(|p| p.to_string()).unwrap_or_default()
        ),
        Err(_) => base_url.to_string(),
    };
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
