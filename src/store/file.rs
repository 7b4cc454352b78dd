use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use super::{Callback, QuiltStore, Subscription, set_at, spawn_poller, value_at};
use crate::error::{QuiltError, Result};

/// One JSON document on disk.
///
/// Every write re-reads the file, patches the path and atomically replaces
/// the document through a temp file in the same directory.  Subscriptions
/// poll the file.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    poll_interval: Duration,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_secs(1),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_root(path: &Path) -> Result<Value> {
        match fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Value::Null),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Null),
            Err(e) => Err(e.into()),
        }
    }

    fn write_root(&self, root: &Value) -> Result<()> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| QuiltError::invalid(format!("'{}' is not a file path", self.path.display())))?;
        let tmp = dir.join(format!(".{}.tmp", file_name));
        {
            let mut file = fs::File::create(&tmp)?;
            let bytes = serde_json::to_vec_pretty(root)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl QuiltStore for FileStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        let root = Self::read_root(&self.path)?;
        Ok(value_at(&root, path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| QuiltError::store("file store lock poisoned"))?;
        let mut root = Self::read_root(&self.path)?;
        set_at(&mut root, path, value)?;
        self.write_root(&root)
    }

    fn subscribe(&self, path: &str, callback: Callback) -> Result<Subscription> {
        let file = self.path.clone();
        let key = path.to_string();
        spawn_poller(
            format!("{}:{}", self.path.display(), path),
            self.poll_interval,
            move || {
                let root = Self::read_root(&file)?;
                Ok(value_at(&root, &key).cloned())
            },
            callback,
        )
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
