//! Shared key-value store clients.
//!
//! The quilt lives under a single path (`squares`) and snapshots under
//! `snapshots/manual/<timestamp>`.  Every implementation exposes the same
//! three operations: read a path, overwrite a path, and subscribe to changes
//! at a path.  Writes replace the whole value at the path; there is no merge.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{QuiltError, Result};

pub mod file;
pub mod memory;
pub mod rest;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use rest::RestStore;

/// Path of the live quilt.
pub const SQUARES_PATH: &str = "squares";
/// Parent of all manual snapshots.
pub const SNAPSHOTS_PATH: &str = "snapshots/manual";

/// Receives the value at a subscribed path (`None` when the path is empty).
/// May run on a worker thread.
pub type Callback = Arc<dyn Fn(Option<Value>) + Send + Sync + 'static>;

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait QuiltStore: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Overwrite the value at `path`.  Writing `Value::Null` deletes it.
    fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Deliver the current value at `path`, then every later change, until
    /// the returned handle is dropped.
    fn subscribe(&self, path: &str, callback: Callback) -> Result<Subscription>;

    /// Short human-readable description for logs and CLI output.
    fn describe(&self) -> String;
}

// ============================================================================
// SUBSCRIPTION HANDLE
// ============================================================================

/// Live subscription.  Dropping it stops delivery; for polling stores it
/// also stops and joins the worker thread.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ============================================================================
// PATH HELPERS
// ============================================================================

/// `/`-separated path split into non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// True when one path is an ancestor of (or equal to) the other.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    let a = split_path(a);
    let b = split_path(b);
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Value under `path` in a JSON tree.  Arrays are indexed by number.
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for seg in split_path(path) {
        node = match node {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!node.is_null()).then_some(node)
}

/// Write `value` at `path`, creating intermediate objects as needed.
/// `Value::Null` removes the key.
pub fn set_at(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for seg in parents {
        node = child_mut(node, seg, path)?;
    }

    if !node.is_object() && !node.is_array() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => {
            let idx = array_index(last, items.len(), path)?;
            items[idx] = value;
        }
        Value::Object(map) => {
            if value.is_null() {
                map.remove(*last);
            } else {
                map.insert((*last).to_string(), value);
            }
        }
        _ => return Err(QuiltError::store(format!("cannot write at '{}'", path))),
    }
    Ok(())
}

fn child_mut<'a>(node: &'a mut Value, seg: &str, path: &str) -> Result<&'a mut Value> {
    if !node.is_object() && !node.is_array() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => {
            let idx = array_index(seg, items.len(), path)?;
            Ok(&mut items[idx])
        }
        Value::Object(map) => Ok(map
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        _ => Err(QuiltError::store(format!("cannot descend into '{}'", path))),
    }
}

fn array_index(seg: &str, len: usize, path: &str) -> Result<usize> {
    match seg.parse::<usize>() {
        Ok(idx) if idx < len => Ok(idx),
        _ => Err(QuiltError::invalid(format!(
            "'{}' is not a valid index into a list of {} at '{}'",
            seg, len, path
        ))),
    }
}

// ============================================================================
// POLLING SUBSCRIPTIONS
// ============================================================================

/// Run `fetch` every `interval` on a worker thread and call `callback` when
/// the value changes.  The first fetch is always delivered.  Fetch errors are
/// logged and retried on the next tick.
pub(crate) fn spawn_poller<F>(
    label: String,
    interval: Duration,
    fetch: F,
    callback: Callback,
) -> Result<Subscription>
where
    F: Fn() -> Result<Option<Value>> + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handle: JoinHandle<()> = std::thread::Builder::new()
        .name(format!("poll {}", label))
        .spawn(move || {
            let mut last: Option<String> = None;
            loop {
                match fetch() {
                    Ok(value) => {
                        let fingerprint = value
                            .as_ref()
                            .map_or_else(|| "null".to_string(), Value::to_string);
                        if last.as_deref() != Some(fingerprint.as_str()) {
                            last = Some(fingerprint);
                            callback(value);
                        }
                    }
                    Err(e) => {
                        crate::log_warn!("Polling {} failed: {}", label, e);
                    }
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    // Stop requested or handle dropped
                    _ => break,
                }
            }
        })?;

    Ok(Subscription::new(move || {
        let _ = stop_tx.send(());
        let _ = handle.join();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_read_nested_paths() {
        let mut root = Value::Null;
        set_at(&mut root, "snapshots/manual/100", json!({"label": "a"})).unwrap();
        set_at(&mut root, "squares", json!([1, 2, 3])).unwrap();
        assert_eq!(value_at(&root, "snapshots/manual/100/label"), Some(&json!("a")));
        assert_eq!(value_at(&root, "/squares/1"), Some(&json!(2)));
        assert_eq!(value_at(&root, "squares/9"), None);
        assert_eq!(value_at(&root, "nothing/here"), None);
    }

    #[test]
    fn null_deletes_and_root_replaces() {
        let mut root = json!({"a": {"b": 1, "c": 2}});
        set_at(&mut root, "a/b", Value::Null).unwrap();
        assert_eq!(root, json!({"a": {"c": 2}}));
        set_at(&mut root, "", json!({"z": true})).unwrap();
        assert_eq!(root, json!({"z": true}));
    }

    #[test]
    fn array_elements_are_addressable() {
        let mut root = json!({"squares": [0, 0]});
        set_at(&mut root, "squares/1", json!(5)).unwrap();
        assert_eq!(root, json!({"squares": [0, 5]}));
        assert!(set_at(&mut root, "squares/2", json!(5)).is_err());
    }

    #[test]
    fn overlap_is_ancestor_or_descendant() {
        assert!(paths_overlap("squares", "squares/3"));
        assert!(paths_overlap("snapshots/manual/1", "snapshots"));
        assert!(paths_overlap("", "anything"));
        assert!(!paths_overlap("squares", "snapshots"));
    }

    #[test]
    fn poller_delivers_only_changes_and_stops_on_drop() {
        use std::sync::Mutex;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&calls);
        let fetch = move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!(n / 3)))
        };
        let s = Arc::clone(&seen);
        let sub = spawn_poller(
            "test".into(),
            Duration::from_millis(5),
            fetch,
            Arc::new(move |v| s.lock().unwrap().push(v)),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(80));
        drop(sub);
        let after = calls.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(calls.load(Ordering::SeqCst), after, "worker stopped");

        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 2);
        for (i, v) in seen.iter().enumerate() {
            assert_eq!(v, &Some(json!(i)));
        }
    }
}
