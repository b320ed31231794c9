//! Persistent set of identity keys that were already notified

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Identity keys of alerts already sent to the alert chat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifiedKeys {
    keys: BTreeSet<String>,
}

impl NotifiedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns true if the key was not present before
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl FromIterator<String> for NotifiedKeys {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Keys shared between the pipeline and in-flight dispatch tasks
pub type KeyStoreHandle = Arc<RwLock<NotifiedKeys>>;

pub fn new_key_store_handle(keys: NotifiedKeys) -> KeyStoreHandle {
    Arc::new(RwLock::new(keys))
}

/// Storage for the notified-key set
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait KeyStore: Send + Sync {
    /// Load the stored keys; a store that does not exist yet is empty
    async fn load(&self) -> crate::Result<NotifiedKeys>;

    /// Replace the stored keys
    async fn save(&self, keys: &NotifiedKeys) -> crate::Result<()>;
}

/// Keys stored as a pretty-printed JSON array of strings
#[derive(Debug, Clone)]
pub struct JsonFileKeyStore {
    path: PathBuf,
}

impl JsonFileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl KeyStore for JsonFileKeyStore {
    async fn load(&self) -> crate::Result<NotifiedKeys> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache at {:?}, starting empty", self.path);
                return Ok(NotifiedKeys::new());
            }
            Err(e) => return Err(e.into()),
        };

        let keys: Vec<String> = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} notified keys from {:?}", keys.len(), self.path);
        Ok(keys.into_iter().collect())
    }

    async fn save(&self, keys: &NotifiedKeys) -> crate::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let list: Vec<&str> = keys.iter().collect();
        let json = serde_json::to_string_pretty(&list)?;

        // Readers never observe a half-written file
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!("Saved {} notified keys to {:?}", keys.len(), self.path);
        Ok(())
    }
}
