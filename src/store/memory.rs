use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;

use super::{Callback, QuiltStore, Subscription, paths_overlap, set_at, value_at};
use crate::error::{QuiltError, Result};

struct Subscriber {
    id: u64,
    path: String,
    callback: Callback,
}

#[derive(Default)]
struct MemoryInner {
    root: Value,
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// In-process JSON tree with synchronous change notification.
///
/// Clones share the same tree.  Callbacks run on the writer's thread after
/// the lock is released, so a callback may read or write the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn with_root(root: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                root,
                ..Default::default()
            })),
        }
    }

    /// Copy of the whole document.
    pub fn snapshot(&self) -> Result<Value> {
        Ok(self.lock()?.root.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|inner| inner.subscribers.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| QuiltError::store("memory store lock poisoned"))
    }
}

impl QuiltStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(value_at(&self.lock()?.root, path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        let deliveries: Vec<(Callback, Option<Value>)> = {
            let mut inner = self.lock()?;
            set_at(&mut inner.root, path, value)?;
            let root = &inner.root;
            inner
                .subscribers
                .iter()
                .filter(|s| paths_overlap(&s.path, path))
                .map(|s| (Arc::clone(&s.callback), value_at(root, &s.path).cloned()))
                .collect()
        };
        for (callback, value) in deliveries {
            callback(value);
        }
        Ok(())
    }

    fn subscribe(&self, path: &str, callback: Callback) -> Result<Subscription> {
        let (id, current) = {
            let mut inner = self.lock()?;
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(Subscriber {
                id,
                path: path.to_string(),
                callback: Arc::clone(&callback),
            });
            (id, value_at(&inner.root, path).cloned())
        };
        callback(current);

        let weak: Weak<Mutex<MemoryInner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade()
                && let Ok(mut inner) = inner.lock()
            {
                inner.subscribers.retain(|s| s.id != id);
            }
        }))
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
