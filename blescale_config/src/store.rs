//! Persisted parameter store.
//!
//! `ConfigStore` is the single owner of the live `Configuration`. Every
//! successful mutation is written through to the `Persistence` backend
//! immediately. A failed write is reported to the caller but the in-memory
//! value is kept: flash write cycles are scarce and the node must keep
//! running with what it was told.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::ConfigError;
use crate::params::{Configuration, ParamKey, ParamValue};

/// Storage backend for the serialized parameter document.
pub trait Persistence {
    /// Persisted document, or `None` when nothing was ever saved.
    fn load(&mut self) -> Result<Option<String>, ConfigError>;
    /// Replace the persisted document.
    fn save(&mut self, contents: &str) -> Result<(), ConfigError>;
}

impl<T: Persistence + ?Sized> Persistence for Box<T> {
    fn load(&mut self) -> Result<Option<String>, ConfigError> {
        (**self).load()
    }
    fn save(&mut self, contents: &str) -> Result<(), ConfigError> {
        (**self).save(contents)
    }
}

/// JSON document on a filesystem path.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for FileStorage {
    fn load(&mut self) -> Result<Option<String>, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    fn save(&mut self, contents: &str) -> Result<(), ConfigError> {
        // Write-then-rename so a reset mid-write never leaves half a document
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| ConfigError::Persist(format!("{}: {e}", self.path.display())))
    }
}

/// In-memory backend; clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    doc: Arc<Mutex<Option<String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        let s = Self::default();
        if let Ok(mut doc) = s.doc.lock() {
            *doc = Some(contents.into());
        }
        s
    }

    /// Current persisted document.
    pub fn contents(&self) -> Option<String> {
        self.doc.lock().ok().and_then(|d| d.clone())
    }

    /// Make subsequent saves fail (simulates a worn or full medium).
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut f) = self.fail_writes.lock() {
            *f = fail;
        }
    }
}

impl Persistence for MemoryStorage {
    fn load(&mut self) -> Result<Option<String>, ConfigError> {
        Ok(self.contents())
    }

    fn save(&mut self, contents: &str) -> Result<(), ConfigError> {
        if self.fail_writes.lock().map(|f| *f).unwrap_or(false) {
            return Err(ConfigError::Persist("write rejected".into()));
        }
        let mut doc = self
            .doc
            .lock()
            .map_err(|_| ConfigError::Persist("storage lock poisoned".into()))?;
        *doc = Some(contents.to_owned());
        Ok(())
    }
}

pub struct ConfigStore<P: Persistence> {
    config: Configuration,
    persistence: P,
}

impl<P: Persistence> ConfigStore<P> {
    /// Load the persisted document merged over the defaults.
    ///
    /// Never fails: a missing, unreadable or malformed document yields defaults
    /// (merged with whatever keys are valid).
    pub fn load(mut persistence: P) -> Self {
        let config = match persistence.load() {
            Ok(Some(text)) => Configuration::merge_json(&text).config,
            Ok(None) => {
                tracing::info!("no persisted config; using defaults");
                Configuration::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted config; using defaults");
                Configuration::default()
            }
        };
        tracing::debug!(config = %config.to_json(), "config loaded");
        Self {
            config,
            persistence,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn get(&self, key: ParamKey) -> ParamValue {
        self.config.get(key)
    }

    /// Validate and apply `value`, then persist.
    ///
    /// - `Err(ConfigError::InvalidValue)`: nothing changed, nothing written.
    /// - `Err(ConfigError::Persist | Io)`: the new value is live but the write failed.
    pub fn set(&mut self, key: ParamKey, value: ParamValue) -> Result<(), ConfigError> {
        self.config.set(key, value)?;
        tracing::info!(key = key.as_str(), value = %value, "parameter updated");
        self.persist()
    }

    /// Parse `text` as `key`'s type, then `set` it. Returns the applied value.
    pub fn set_text(&mut self, key: ParamKey, text: &str) -> Result<ParamValue, ConfigError> {
        let value = key.parse_value(text)?;
        self.set(key, value)?;
        Ok(value)
    }

    /// Rewrite the whole document.
    pub fn persist(&mut self) -> Result<(), ConfigError> {
        let doc = self.config.to_json();
        self.persistence.save(&doc).inspect_err(|e| {
            tracing::error!(error = %e, "failed to persist config");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_gives_defaults() {
        let store = ConfigStore::load(MemoryStorage::new());
        assert_eq!(store.configuration(), &Configuration::default());
    }

    #[test]
    fn set_writes_through() {
        let mem = MemoryStorage::new();
        let mut store = ConfigStore::load(mem.clone());
        store.set(ParamKey::Scale, ParamValue::Real(2.0)).unwrap();
        let doc = mem.contents().expect("persisted");
        let reloaded = Configuration::merge_json(&doc);
        assert!(reloaded.rejected.is_empty());
        assert_eq!(reloaded.config.scale, 2.0);
    }

    #[test]
    fn invalid_set_writes_nothing() {
        let mem = MemoryStorage::new();
        let mut store = ConfigStore::load(mem.clone());
        let err = store.set_text(ParamKey::AwakeMs, "soon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "awake_ms", .. }));
        assert!(mem.contents().is_none());
        assert_eq!(store.configuration(), &Configuration::default());
    }

    #[test]
    fn persist_failure_keeps_in_memory_value() {
        let mem = MemoryStorage::new();
        mem.set_fail_writes(true);
        let mut store = ConfigStore::load(mem.clone());
        let err = store.set(ParamKey::AwakeMs, ParamValue::Integer(5000)).unwrap_err();
        assert!(matches!(err, ConfigError::Persist(_)));
        assert_eq!(store.configuration().awake_ms, 5000);
        assert!(mem.contents().is_none());
    }
}
