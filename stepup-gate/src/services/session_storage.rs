//! Session storage boundary.
//!
//! Mirrors a browser's per-tab session storage: string values under string
//! keys, cleared when the browsing session ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::ServiceError;

pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, ServiceError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), ServiceError>;
    fn remove_item(&self, key: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `set_item` fail, as a full or disabled storage would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Drop everything, as when the browsing session ends.
    pub fn clear(&self) {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let items = self
            .items
            .lock()
            .map_err(|e| ServiceError::Storage(format!("session storage poisoned: {}", e)))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Storage("session storage quota exceeded".into()));
        }
        self.items
            .lock()
            .map_err(|e| ServiceError::Storage(format!("session storage poisoned: {}", e)))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), ServiceError> {
        self.items
            .lock()
            .map_err(|e| ServiceError::Storage(format!("session storage poisoned: {}", e)))?
            .remove(key);
        Ok(())
    }
}
