//! Latest-value snapshot shared between the scheduler and readers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use venus_model::Value;

/// Cheaply clonable map of signal key to its latest decoded value.
/// Values survive failed cycles; a key is only replaced by a newer
/// successful read.
#[derive(Clone, Default)]
pub struct Snapshot {
    inner: Arc<RwLock<HashMap<&'static str, Value>>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &'static str, value: Value) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only copy of the current contents.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    /// JSON export for diagnostics dumps.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_map()).unwrap_or(serde_json::Value::Null)
    }
}
