//! File-backed settings store.
//!
//! Settings live in one flat JSON object of string values. Writes are staged
//! in memory and `save` rewrites the whole file atomically, so a reader sees
//! either the previous settings or the new ones, never a mix.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::{load_json_config, save_json_config};
use crate::error::ExtensionError;
use crate::host::SettingsStore;

pub struct JsonFileSettings {
    path: PathBuf,
    committed: Mutex<HashMap<String, String>>,
    staged: Mutex<HashMap<String, String>>,
}

impl JsonFileSettings {
    /// Open the store at `path`. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let committed: HashMap<String, String> = load_json_config(&path);
        tracing::debug!(path = %path.display(), keys = committed.len(), "Opened settings store");
        Self {
            path,
            committed: Mutex::new(committed),
            staged: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    fn get_all(&self) -> HashMap<String, String> {
        self.committed.lock().clone()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ExtensionError> {
        if key.is_empty() {
            return Err(ExtensionError::validation("Setting key is empty"));
        }
        self.staged.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn save(&self) -> Result<(), ExtensionError> {
        let staged = std::mem::take(&mut *self.staged.lock());
        let mut next = self.committed.lock().clone();
        next.extend(staged);

        save_json_config(&self.path, &next).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to commit settings");
            ExtensionError::host(format!("Failed to commit settings: {e}"))
        })?;

        *self.committed.lock() = next;
        Ok(())
    }

    fn discard(&self) {
        self.staged.lock().clear();
    }
}
