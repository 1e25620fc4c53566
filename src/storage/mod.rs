//! Persistence is organized in two layers:
//!   - [KeyValueStore] is a flat string-keyed store. [file_store::FileStore] keeps it in a json
//!     file inside the application directory, [MemoryStore] keeps it in memory.
//!   - [repository::Repository] maps the domain entities onto store keys and validates every
//!     field on load.

pub mod file_store;
pub mod repository;

use std::{collections::BTreeMap, ops::DerefMut};

use anyhow::Result;

/// Interface for abstracting the string-keyed store the application persists into.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    /// Removes every key.
    fn clear(&mut self) -> Result<()>;
}

impl<T: DerefMut> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, key: &str) -> Option<String> {
        self.deref().get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.deref_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.deref_mut().remove(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.deref_mut().clear()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}
