//! Quilt-level history and store synchronization.
//!
//! `QuiltSession` owns the local copy of the quilt.  Edits are applied
//! locally first and then handed to a background writer thread that pushes
//! the whole grid to `squares`.  Remote changes arrive through a store
//! subscription and are applied once per frame by `poll_remote`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde_json::Value;

use crate::components::history::HistoryManager;
use crate::error::{QuiltError, Result};
use crate::grid::{PixelGrid, Quilt, QuiltLayout};
use crate::store::{QuiltStore, SQUARES_PATH, Subscription};
use crate::{log_err, log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Write the restored quilt back to the store after an undo.
    pub undo_persists: bool,
    pub max_history: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            undo_persists: false,
            max_history: 50,
        }
    }
}

// ============================================================================
// BACKGROUND WRITER
// ============================================================================

enum WriteJob {
    Quilt(Value),
    Flush(Sender<()>),
    Stop,
}

struct Writer {
    sender: Sender<WriteJob>,
    handle: Option<JoinHandle<()>>,
}

impl Writer {
    fn spawn(store: Arc<dyn QuiltStore>, failures: Arc<AtomicUsize>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<WriteJob>();
        let handle = std::thread::Builder::new()
            .name("quilt writer".into())
            .spawn(move || writer_loop(store.as_ref(), receiver, &failures))?;
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    fn enqueue(&self, value: Value) {
        if self.sender.send(WriteJob::Quilt(value)).is_err() {
            log_err!("Quilt writer has stopped; dropping write");
        }
    }

    fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.sender.send(WriteJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    fn stop(&mut self) {
        let _ = self.sender.send(WriteJob::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Drain everything queued, write only the newest quilt, then acknowledge
/// flushes.
fn writer_loop(store: &dyn QuiltStore, receiver: Receiver<WriteJob>, failures: &AtomicUsize) {
    while let Ok(first) = receiver.recv() {
        let mut pending: Option<Value> = None;
        let mut acks: Vec<Sender<()>> = Vec::new();
        let mut stop = false;

        let mut take = |job: WriteJob| match job {
            WriteJob::Quilt(value) => pending = Some(value),
            WriteJob::Flush(ack) => acks.push(ack),
            WriteJob::Stop => stop = true,
        };
        take(first);
        while let Ok(job) = receiver.try_recv() {
            take(job);
        }

        if let Some(value) = pending {
            if let Err(e) = store.set(SQUARES_PATH, value) {
                failures.fetch_add(1, Ordering::Relaxed);
                log_err!("Writing quilt to {} failed: {}", store.describe(), e);
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
        if stop {
            break;
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

struct RemoteFeed {
    _subscription: Subscription,
    receiver: Receiver<Option<Value>>,
}

pub struct QuiltSession {
    store: Arc<dyn QuiltStore>,
    layout: QuiltLayout,
    quilt: Quilt,
    history: HistoryManager<Quilt>,
    options: SessionOptions,
    writer: Writer,
    remote: Option<RemoteFeed>,
    failed_writes: Arc<AtomicUsize>,
}

impl QuiltSession {
    /// Start from a blank quilt of `layout`.  Nothing is written until the
    /// first edit.
    pub fn new(
        store: Arc<dyn QuiltStore>,
        layout: QuiltLayout,
        options: SessionOptions,
    ) -> Result<Self> {
        let failed_writes = Arc::new(AtomicUsize::new(0));
        let writer = Writer::spawn(Arc::clone(&store), Arc::clone(&failed_writes))?;
        log_info!(
            "Quilt session on {} ({} squares, {}x{})",
            store.describe(),
            layout.squares,
            layout.grid_size,
            layout.grid_size
        );
        Ok(Self {
            store,
            layout,
            quilt: Quilt::blank(layout),
            history: HistoryManager::new(options.max_history),
            options,
            writer,
            remote: None,
            failed_writes,
        })
    }

    pub fn quilt(&self) -> &Quilt {
        &self.quilt
    }

    pub fn layout(&self) -> QuiltLayout {
        self.layout
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn history_len(&self) -> usize {
        self.history.undo_count()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Background writes that failed since the session started.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &Arc<dyn QuiltStore> {
        &self.store
    }

    /// Replace square `index` with `pixels` and push the quilt to the store.
    pub fn commit_square_update(&mut self, index: usize, pixels: PixelGrid) -> Result<()> {
        let mut next = self.quilt.clone();
        next.replace(index, pixels)?;
        self.commit("Edit square", next);
        Ok(())
    }

    /// Deep-copy square `from` over square `to`.
    pub fn commit_pattern_copy(&mut self, from: usize, to: usize) -> Result<()> {
        let source = self.quilt.square(from)?.clone();
        let mut next = self.quilt.clone();
        next.replace(to, source)?;
        self.commit("Copy pattern", next);
        log_info!("Copied pattern {} -> {}", from, to);
        Ok(())
    }

    fn commit(&mut self, description: &str, next: Quilt) {
        let previous = std::mem::replace(&mut self.quilt, next);
        self.history.push(description, previous);
        self.writer.enqueue(self.quilt.to_value());
    }

    /// Restore the quilt before the last commit.  Returns false when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(checkpoint) = self.history.undo() else {
            return false;
        };
        self.quilt = checkpoint.state;
        if self.options.undo_persists {
            self.writer.enqueue(self.quilt.to_value());
        } else {
            log_warn!(
                "Undid '{}' locally only; other clients keep the newer quilt",
                checkpoint.description
            );
        }
        true
    }

    /// Block until every queued write has reached the store.
    pub fn flush(&self) {
        self.writer.flush();
    }

    // ------------------------------------------------------------------
    // Remote changes
    // ------------------------------------------------------------------

    pub fn attach_remote(&mut self) -> Result<()> {
        if self.remote.is_some() {
            return Ok(());
        }
        let (sender, receiver) = mpsc::channel::<Option<Value>>();
        let subscription = self.store.subscribe(
            SQUARES_PATH,
            Arc::new(move |value| {
                let _ = sender.send(value);
            }),
        )?;
        self.remote = Some(RemoteFeed {
            _subscription: subscription,
            receiver,
        });
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.remote.is_some()
    }

    pub fn detach_remote(&mut self) {
        self.remote = None;
    }

    /// Apply every remote value received since the last call.  Returns true
    /// when the local quilt changed.
    pub fn poll_remote(&mut self) -> bool {
        let Some(feed) = &self.remote else {
            return false;
        };
        let mut latest: Option<Value> = None;
        while let Ok(value) = feed.receiver.try_recv() {
            if value.is_some() {
                latest = value;
            }
        }
        let Some(value) = latest else {
            return false;
        };
        match self.decode(&value) {
            Ok(quilt) if quilt == self.quilt => false,
            Ok(quilt) => {
                self.quilt = quilt;
                true
            }
            Err(e) => {
                log_warn!("Ignoring remote quilt: {}", e);
                false
            }
        }
    }

    /// Read `squares` once and adopt it.  A missing quilt keeps the blank
    /// one.
    pub fn load(&mut self) -> Result<bool> {
        match self.store.get(SQUARES_PATH)? {
            Some(value) => {
                self.quilt = self.decode(&value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Adopt a quilt from elsewhere (offline cache) without touching history
    /// or the store.
    pub fn adopt(&mut self, quilt: Quilt) -> Result<()> {
        quilt.validate()?;
        if quilt.grid_size() != self.layout.grid_size || quilt.columns() != self.layout.columns {
            return Err(QuiltError::shape(format!(
                "cached quilt is {} columns of {}x{}, expected {} columns of {}x{}",
                quilt.columns(),
                quilt.grid_size(),
                quilt.grid_size(),
                self.layout.columns,
                self.layout.grid_size,
                self.layout.grid_size
            )));
        }
        self.quilt = quilt;
        Ok(())
    }

    fn decode(&self, value: &Value) -> Result<Quilt> {
        Quilt::from_value(value, self.layout.columns, self.layout.grid_size)
    }
}

impl Drop for QuiltSession {
    fn drop(&mut self) {
        self.remote = None;
        self.writer.stop();
    }
}
