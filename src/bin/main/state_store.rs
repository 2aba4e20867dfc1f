use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn};
use pacer_core::settings::KeyValueStore;

/// Key/value store kept as one JSON object on disk.
///
/// Every `set` rewrites the whole file; values are small and writes are
/// already debounced by the session.
pub(super) struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when it is missing or unreadable.
    pub(super) fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_values(&path) {
            Ok(values) => values,
            Err(err) => {
                if path.exists() {
                    warn!("state: ignoring unreadable {} err={:#}", path.display(), err);
                } else {
                    info!("state: starting fresh at {}", path.display());
                }
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

impl KeyValueStore for JsonFileStore {
    type Error = anyhow::Error;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_owned(), value.to_owned());
        self.persist()
    }
}
