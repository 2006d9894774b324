//! Auth token persistence
//!
//! The token lives under `admin_auth_token`. Older builds wrote it under
//! `admin_api_key`; that key is still read when the current one is absent
//! and is removed whenever a token is explicitly set.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use crate::config::Config;

pub const TOKEN_KEY: &str = "admin_auth_token";
pub const LEGACY_TOKEN_KEY: &str = "admin_api_key";

/// String key/value storage backend for the session store.
pub trait KeyValueStorage {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// TOML file in the config directory (`session.toml`, mode 0600).
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Storage at the default location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Config::config_dir()?.join("session.toml")))
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).context("Failed to read session file")?;
        toml::from_str(&content).context("Failed to parse session file")
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(entries).context("Failed to serialize session")?;
        fs::write(&self.path, content).context("Failed to write session file")?;

        // Set restrictive permissions on session file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .context("Failed to set session file permissions")?;
        }

        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// Process-local storage, used by tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl KeyValueStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Token store. Never fails: storage faults degrade to "no token".
pub struct SessionStore<S: KeyValueStorage> {
    storage: S,
}

impl SessionStore<FileStorage> {
    /// Open the store at its default on-disk location.
    pub fn open() -> Result<Self> {
        Ok(Self::new(FileStorage::default_location()?))
    }
}

impl<S: KeyValueStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Current token, or `""` when none is stored or storage is unreadable.
    pub fn get(&self) -> String {
        for key in [TOKEN_KEY, LEGACY_TOKEN_KEY] {
            match self.storage.read(key) {
                Ok(Some(token)) if !token.is_empty() => return token,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Session storage unreadable: {:#}", e);
                    return String::new();
                }
            }
        }
        String::new()
    }

    /// Store a token (trimmed) and drop the legacy key.
    pub fn set(&mut self, token: &str) {
        if let Err(e) = self.storage.write(TOKEN_KEY, token.trim()) {
            tracing::warn!("Failed to persist session token: {:#}", e);
            return;
        }
        if let Err(e) = self.storage.remove(LEGACY_TOKEN_KEY) {
            tracing::warn!("Failed to remove legacy session key: {:#}", e);
        }
    }

    /// Forget the token under both keys.
    pub fn clear(&mut self) {
        for key in [TOKEN_KEY, LEGACY_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("Failed to clear session key {}: {:#}", key, e);
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.get().is_empty()
    }
}
