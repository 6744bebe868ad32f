use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::error;

use crate::dispatch::{Handler, ListenerId};

/// Keyed JSON state with per-key subscribers.
#[derive(Default)]
pub struct StateStore {
    values: Mutex<BTreeMap<String, Value>>,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>,
    /// Ids written through `set_record`, oldest first, per prefix.
    records: Mutex<HashMap<String, VecDeque<String>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Handler)>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }

    /// Stores `value` under `key` and notifies that key's subscribers.
    pub fn set(&self, key: &str, value: Value) {
        self.values().insert(key.to_string(), value.clone());
        self.notify(key, &value);
    }

    /// Stores `value` under `<prefix>.<id>`, keeping at most `cap` ids per
    /// prefix. Rewriting an id makes it the newest; the oldest ids beyond
    /// `cap` are removed from the store.
    pub fn set_record(&self, prefix: &str, id: &str, value: Value, cap: usize) {
        let evicted: Vec<String> = {
            let mut records = self.records();
            let order = records.entry(prefix.to_string()).or_default();
            order.retain(|existing| existing != id);
            order.push_back(id.to_string());
            let excess = order.len().saturating_sub(cap.max(1));
            order
                .drain(..excess)
                .map(|old| format!("{prefix}.{old}"))
                .collect()
        };
        if !evicted.is_empty() {
            let mut values = self.values();
            for key in &evicted {
                values.remove(key);
            }
        }
        self.set(&format!("{prefix}.{id}"), value);
    }

    /// Appends `entry` to the array under `key`, keeping at most `cap` newest entries.
    pub fn push(&self, key: &str, entry: Value, cap: usize) {
        let updated = {
            let mut values = self.values();
            let slot = values
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(list) = slot {
                list.push(entry);
                if list.len() > cap {
                    let excess = list.len() - cap;
                    list.drain(..excess);
                }
            }
            slot.clone()
        };
        self.notify(key, &updated);
    }

    pub fn subscribe<F>(&self, key: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId::next();
        self.listeners()
            .entry(key.to_string())
            .or_default()
            .push((id, std::sync::Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, key: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        match listeners.get_mut(key) {
            Some(list) => {
                let before = list.len();
                list.retain(|(lid, _)| *lid != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Copy of every key currently held.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values().clone()
    }

    fn notify(&self, key: &str, value: &Value) {
        let snapshot: Vec<Handler> = match self.listeners().get(key) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return,
        };
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                error!(key, "state subscriber panicked");
            }
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("keys", &self.values().len())
            .finish()
    }
}
