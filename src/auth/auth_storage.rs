use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tempfile::NamedTempFile;

use crate::auth::error::AuthError;

/// Durable string key-value store with `localStorage` semantics.
///
/// Methods take `&self`; implementations use interior mutability so one
/// handle can be shared between the flow and the host application.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        (**self).remove(key)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AuthError> {
    mutex
        .lock()
        .map_err(|_| AuthError::Storage(io::Error::other("Failed to lock storage")))
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// All keys live in a single JSON object on disk. The file is re-read on every
/// access so that several processes (or a restarted one) see the same state.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `<data_local_dir>/<app_name>/auth.json`
    pub fn default_location(app_name: &str) -> Result<Self, AuthError> {
        let data_dir = dirs::data_local_dir().ok_or_else(|| {
            AuthError::Storage(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;
        Ok(Self::new(get_auth_file(&data_dir.join(app_name))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, AuthError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let mut file = File::open(&self.path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn update<F>(&self, apply: F) -> Result<(), AuthError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = lock(&self.write_lock)?;
        let mut entries = self.load()?;
        apply(&mut entries);
        save_entries_to_file(&self.path, &entries)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

pub fn get_auth_file(dir: &Path) -> PathBuf {
    dir.join("auth.json")
}

fn save_entries_to_file(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), AuthError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    // Written to a sibling temp file (owner-only) and renamed over the target.
    let mut file = NamedTempFile::new_in(dir)?;
    let json_string = serde_json::to_string_pretty(entries)?;
    file.write_all(json_string.as_bytes())?;
    file.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.persist(path).map_err(|e| AuthError::Storage(e.error))?;

    Ok(())
}
