//! Operator maintenance on the stored quilt: reset, expand, roll back.
//!
//! Each destructive operation is split into a pure `plan_*` step that
//! computes the new data plus everything the operator should see, and an
//! `apply_*` step that writes it and re-reads the store to verify.  The
//! interactive confirmation flow around them lives in the CLI.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use serde_json::Value;

use crate::color::Color;
use crate::error::{QuiltError, Result};
use crate::grid::{PixelGrid, Quilt, QuiltLayout};
use crate::log_info;
use crate::snapshot::{calculate_size, hash_data, validate_squares};
use crate::store::{QuiltStore, SQUARES_PATH};

// ============================================================================
// OUTCOME & PROMPTS
// ============================================================================

/// How an interactive flow ended.  Cancellation is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    NothingToDo,
}

/// Source of operator answers.
pub trait Prompt {
    /// Show `question` and return the answer without its line ending.
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Reads answers from standard input.  End of input reads as an empty answer.
#[derive(Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", question)?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Fixed list of answers, consumed in order.  Running out answers "".
#[derive(Default, Debug)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Read and return the raw `squares` list.
pub fn read_squares(store: &dyn QuiltStore) -> Result<Vec<Value>> {
    let value = store
        .get(SQUARES_PATH)?
        .ok_or_else(|| QuiltError::not_found(SQUARES_PATH))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(QuiltError::shape("Data is not an array")),
    }
}

/// Every pixel of a raw square parses to `background`.
pub fn is_blank_square(square: &Value, background: Color) -> bool {
    let Some(rows) = square.as_array() else {
        return false;
    };
    rows.iter().all(|row| {
        row.as_array().is_some_and(|cells| {
            cells.iter().all(|cell| {
                cell.as_str()
                    .and_then(|s| Color::parse(s).ok())
                    .is_some_and(|c| c == background)
            })
        })
    })
}

fn blank_square_value(grid_size: usize, background: Color) -> Value {
    PixelGrid::filled(grid_size, background).to_value()
}

// ============================================================================
// RESET
// ============================================================================

/// Overwrite the store with an all-background quilt.
pub fn reset(store: &dyn QuiltStore, layout: QuiltLayout) -> Result<()> {
    let quilt = Quilt::blank(layout);
    store.set(SQUARES_PATH, quilt.to_value())?;
    log_info!(
        "Reset {} to {} blank {}×{} squares",
        store.describe(),
        layout.squares,
        layout.grid_size,
        layout.grid_size
    );
    Ok(())
}

// ============================================================================
// EXPAND
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct ExpandPlan {
    pub current_count: usize,
    pub target: usize,
    pub to_add: usize,
    pub current_hash: String,
    /// Hash of the first `current_count` squares of the expanded list.
    pub preserved_hash: String,
    pub current_size: u64,
    pub expanded_size: u64,
    pub expanded: Vec<Value>,
}

impl ExpandPlan {
    pub fn hashes_match(&self) -> bool {
        self.current_hash == self.preserved_hash
    }
}

/// Validate `current` and append blank squares up to `target`.
pub fn plan_expand(
    current: &[Value],
    target: usize,
    grid_size: usize,
    background: Color,
) -> Result<ExpandPlan> {
    let current_value = Value::Array(current.to_vec());
    validate_squares(&current_value, grid_size)?;

    let to_add = target.saturating_sub(current.len());
    let mut expanded = current.to_vec();
    expanded.extend((0..to_add).map(|_| blank_square_value(grid_size, background)));

    let preserved = Value::Array(expanded[..current.len()].to_vec());
    let expanded_value = Value::Array(expanded.clone());
    Ok(ExpandPlan {
        current_count: current.len(),
        target,
        to_add,
        current_hash: hash_data(&current_value),
        preserved_hash: hash_data(&preserved),
        current_size: calculate_size(&current_value),
        expanded_size: calculate_size(&expanded_value),
        expanded,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandReport {
    pub verified_count: usize,
    pub verified_hash: String,
    /// Indices of new squares that did not read back blank.
    pub non_blank: Vec<usize>,
}

/// Write the expanded list, read it back and check the preserved prefix.
pub fn apply_expand(
    store: &dyn QuiltStore,
    plan: &ExpandPlan,
    background: Color,
) -> Result<ExpandReport> {
    if !plan.hashes_match() {
        return Err(QuiltError::Integrity {
            expected: format!("hash {}", plan.current_hash),
            actual: format!("hash {}", plan.preserved_hash),
        });
    }
    store.set(SQUARES_PATH, Value::Array(plan.expanded.clone()))?;

    let verified = read_squares(store)?;
    let keep = plan.current_count.min(verified.len());
    let verified_hash = hash_data(&Value::Array(verified[..keep].to_vec()));
    if verified_hash != plan.current_hash {
        return Err(QuiltError::Integrity {
            expected: format!("hash {}", plan.current_hash),
            actual: format!("hash {}", verified_hash),
        });
    }

    let non_blank = (plan.current_count..verified.len())
        .filter(|&i| !is_blank_square(&verified[i], background))
        .collect();
    log_info!(
        "Expanded quilt from {} to {} squares (preserved hash {})",
        plan.current_count,
        verified.len(),
        verified_hash
    );
    Ok(ExpandReport {
        verified_count: verified.len(),
        verified_hash,
        non_blank,
    })
}

// ============================================================================
// ROLLBACK
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RollbackPlan {
    pub current_count: usize,
    pub target: usize,
    pub to_remove: usize,
    pub current_hash: String,
    pub truncated_hash: String,
    pub current_size: u64,
    pub truncated_size: u64,
    /// Indices of removed squares that carry a design.
    pub custom: Vec<usize>,
    pub truncated: Vec<Value>,
}

impl RollbackPlan {
    pub fn is_noop(&self) -> bool {
        self.to_remove == 0
    }

    /// Whether removed square `index` carries a design.
    pub fn is_custom(&self, index: usize) -> bool {
        self.custom.binary_search(&index).is_ok()
    }
}

/// Truncate `current` to `target` squares.  A list already at or below the
/// target yields a plan with nothing to remove.
pub fn plan_rollback(current: &[Value], target: usize, background: Color) -> RollbackPlan {
    let keep = target.min(current.len());
    let truncated = current[..keep].to_vec();
    let current_value = Value::Array(current.to_vec());
    let truncated_value = Value::Array(truncated.clone());
    RollbackPlan {
        current_count: current.len(),
        target,
        to_remove: current.len() - keep,
        current_hash: hash_data(&current_value),
        truncated_hash: hash_data(&truncated_value),
        current_size: calculate_size(&current_value),
        truncated_size: calculate_size(&truncated_value),
        custom: (keep..current.len())
            .filter(|&i| !is_blank_square(&current[i], background))
            .collect(),
        truncated,
    }
}

/// Write the truncated list and check the stored count.
pub fn apply_rollback(store: &dyn QuiltStore, plan: &RollbackPlan) -> Result<usize> {
    store.set(SQUARES_PATH, Value::Array(plan.truncated.clone()))?;
    let verified = read_squares(store)?;
    if verified.len() != plan.truncated.len() {
        return Err(QuiltError::Integrity {
            expected: format!("{} squares", plan.truncated.len()),
            actual: format!("{} squares", verified.len()),
        });
    }
    log_info!(
        "Rolled quilt back from {} to {} squares",
        plan.current_count,
        verified.len()
    );
    Ok(verified.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Callback, MemoryStore, Subscription};

    /// Store that rewrites every value on its way in, like a lossy backend.
    struct MangledStore {
        inner: MemoryStore,
        mangle: fn(Value) -> Value,
    }

    impl QuiltStore for MangledStore {
        fn get(&self, path: &str) -> Result<Option<Value>> {
            self.inner.get(path)
        }

        fn set(&self, path: &str, value: Value) -> Result<()> {
            self.inner.set(path, (self.mangle)(value))
        }

        fn subscribe(&self, path: &str, callback: Callback) -> Result<Subscription> {
            self.inner.subscribe(path, callback)
        }

        fn describe(&self) -> String {
            "mangled".to_string()
        }
    }

    fn drop_last_square(value: Value) -> Value {
        match value {
            Value::Array(mut items) => {
                items.pop();
                Value::Array(items)
            }
            other => other,
        }
    }

    fn repaint_first_square(value: Value) -> Value {
        match value {
            Value::Array(mut items) if !items.is_empty() => {
                items[0] = PixelGrid::filled(15, Color::rgb(1, 2, 3)).to_value();
                Value::Array(items)
            }
            other => other,
        }
    }

    fn assert_points_to_restore(err: QuiltError) {
        assert!(matches!(err, QuiltError::Integrity { .. }), "{:?}", err);
        assert!(err.to_string().contains("pixel-quilt snapshot restore"), "{}", err);
    }

    fn quilt_value(count: usize) -> Vec<Value> {
        let layout = QuiltLayout::builder().squares(count).columns(5).grid_size(15).build().unwrap();
        match Quilt::blank(layout).to_value() {
            Value::Array(items) => items,
            _ => unreachable!(),
        }
    }

    fn painted(mut squares: Vec<Value>, index: usize) -> Vec<Value> {
        squares[index] = PixelGrid::filled(15, Color::BLACK).to_value();
        squares
    }

    #[test]
    fn blank_check_accepts_any_spelling_of_background() {
        let sq = serde_json::json!([["#f5efee", "rgb(245, 239, 238)"], ["#F5EFEE", "#F5EFEE"]]);
        assert!(is_blank_square(&sq, Color::BACKGROUND));
        let sq = serde_json::json!([["#f5efee", "#000000"]]);
        assert!(!is_blank_square(&sq, Color::BACKGROUND));
        assert!(!is_blank_square(&serde_json::json!("x"), Color::BACKGROUND));
    }

    #[test]
    fn expand_plan_preserves_prefix() {
        let current = painted(quilt_value(30), 4);
        let plan = plan_expand(&current, 48, 15, Color::BACKGROUND).unwrap();
        assert_eq!(plan.to_add, 18);
        assert_eq!(plan.expanded.len(), 48);
        assert!(plan.hashes_match());
        assert!(plan.expanded_size > plan.current_size);
    }

    #[test]
    fn expand_rejects_malformed_data() {
        let mut current = quilt_value(2);
        current[1] = serde_json::json!([["#000000"]]);
        let err = plan_expand(&current, 48, 15, Color::BACKGROUND).unwrap_err();
        assert!(err.to_string().contains("Square 1 has 1 rows, expected 15"), "{}", err);
    }

    #[test]
    fn expand_writes_and_verifies() {
        let store = MemoryStore::new();
        let current = painted(quilt_value(30), 0);
        store.set(SQUARES_PATH, Value::Array(current.clone())).unwrap();
        let plan = plan_expand(&current, 48, 15, Color::BACKGROUND).unwrap();
        let report = apply_expand(&store, &plan, Color::BACKGROUND).unwrap();
        assert_eq!(report.verified_count, 48);
        assert_eq!(report.verified_hash, plan.current_hash);
        assert!(report.non_blank.is_empty());
    }

    #[test]
    fn rollback_plan_lists_custom_squares() {
        let current = painted(painted(quilt_value(48), 31), 40);
        let plan = plan_rollback(&current, 30, Color::BACKGROUND);
        assert_eq!(plan.to_remove, 18);
        assert_eq!(plan.custom, vec![31, 40]);
        assert!(plan.is_custom(40));
        assert!(!plan.is_custom(30));

        let small = plan_rollback(&quilt_value(30), 30, Color::BACKGROUND);
        assert!(small.is_noop());
    }

    #[test]
    fn rollback_writes_and_verifies_count() {
        let store = MemoryStore::new();
        let current = quilt_value(48);
        store.set(SQUARES_PATH, Value::Array(current.clone())).unwrap();
        let plan = plan_rollback(&current, 30, Color::BACKGROUND);
        assert_eq!(apply_rollback(&store, &plan).unwrap(), 30);
        assert_eq!(read_squares(&store).unwrap().len(), 30);
    }

    #[test]
    fn reset_writes_blank_layout() {
        let store = MemoryStore::new();
        reset(&store, QuiltLayout::classic()).unwrap();
        let squares = read_squares(&store).unwrap();
        assert_eq!(squares.len(), 30);
        assert!(squares.iter().all(|s| is_blank_square(s, Color::BACKGROUND)));
    }

    #[test]
    fn scripted_prompt_runs_dry_as_empty() {
        let mut p = ScriptedPrompt::new(["yes"]);
        assert_eq!(p.ask("continue? ").unwrap(), "yes");
        assert_eq!(p.ask("again? ").unwrap(), "");
        assert_eq!(p.asked.len(), 2);
    }

    #[test]
    fn expand_detects_changed_prefix_after_write() {
        let current = painted(quilt_value(30), 4);
        let store = MangledStore {
            inner: MemoryStore::new(),
            mangle: repaint_first_square,
        };
        let plan = plan_expand(&current, 48, 15, Color::BACKGROUND).unwrap();
        let err = apply_expand(&store, &plan, Color::BACKGROUND).unwrap_err();
        assert_points_to_restore(err);
    }

    #[test]
    fn expand_detects_truncated_write() {
        let current = painted(quilt_value(30), 29);
        let store = MangledStore {
            inner: MemoryStore::new(),
            mangle: |value| match value {
                Value::Array(items) => Value::Array(items.into_iter().take(10).collect()),
                other => other,
            },
        };
        let plan = plan_expand(&current, 48, 15, Color::BACKGROUND).unwrap();
        let err = apply_expand(&store, &plan, Color::BACKGROUND).unwrap_err();
        assert_points_to_restore(err);
    }

    #[test]
    fn rollback_detects_short_write() {
        let current = quilt_value(48);
        let store = MangledStore {
            inner: MemoryStore::new(),
            mangle: drop_last_square,
        };
        let plan = plan_rollback(&current, 30, Color::BACKGROUND);
        let err = apply_rollback(&store, &plan).unwrap_err();
        assert_points_to_restore(err);
        let stored = store.get(SQUARES_PATH).unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 29);
    }
}

