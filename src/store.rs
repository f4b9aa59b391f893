//! Persisted setting values.
//!
//! The controllers treat persistence as an opaque load/save-by-key service;
//! the JSON-file implementation is what the CLI uses, the in-memory one backs
//! tests and embedders with their own storage.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::machine::MachineError;

pub trait SettingStore: Send {
    fn load(&self, key: &str) -> Option<f64>;
    fn save(&mut self, key: &str, value: f64) -> Result<(), MachineError>;
}

/// Volatile store, forgotten on shutdown.
#[derive(Default)]
pub struct MemoryStore {
    values: HashMap<String, f64>,
}

impl SettingStore for MemoryStore {
    fn load(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn save(&mut self, key: &str, value: f64) -> Result<(), MachineError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, written on every save.
pub struct JsonFileStore {
    path: PathBuf,
    values: HashMap<String, f64>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MachineError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(JsonFileStore { path, values })
    }
}

impl SettingStore for JsonFileStore {
    fn load(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn save(&mut self, key: &str, value: f64) -> Result<(), MachineError> {
        self.values.insert(key.to_owned(), value);
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::default();
        assert_eq!(store.load("cup_size_coffee"), None);
        store.save("cup_size_coffee", 2.0).unwrap();
        assert_eq!(store.load("cup_size_coffee"), Some(2.0));
    }

    #[test]
    fn json_store_survives_reopen() {
        let path = std::env::temp_dir().join("crema-store-test.json");
        let _ = std::fs::remove_file(&path);

        let mut store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.load("bean_quantity_any"), None);
        store.save("bean_quantity_any", 3.0).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.load("bean_quantity_any"), Some(3.0));

        let _ = std::fs::remove_file(&path);
    }
}
