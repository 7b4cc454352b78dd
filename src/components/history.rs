use std::collections::VecDeque;

// ============================================================================
// CHECKPOINT: a full snapshot plus a human-readable label
// ============================================================================

/// A complete copy of the state taken before a mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint<T> {
    pub description: String,
    pub state: T,
}

// ============================================================================
// HISTORY MANAGER - bounded undo stack of full snapshots
// ============================================================================

/// Undo history of full snapshots, oldest entries dropped past the limit.
///
/// Used twice: the editor keeps one over its working square, the session
/// keeps one over the whole quilt.
#[derive(Clone, Debug)]
pub struct HistoryManager<T> {
    undo_stack: VecDeque<Checkpoint<T>>,
    max_history_size: usize,
}

impl<T> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new(50)
    }
}

impl<T> HistoryManager<T> {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
        }
    }

    pub fn push(&mut self, description: impl Into<String>, state: T) {
        self.undo_stack.push_back(Checkpoint {
            description: description.into(),
            state,
        });
        self.prune();
    }

    /// Pop the most recent checkpoint.  `None` when the stack is empty.
    pub fn undo(&mut self) -> Option<Checkpoint<T>> {
        self.undo_stack.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description.as_str())
    }

    /// All undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description.clone()).collect()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            self.undo_stack.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
    }
}
