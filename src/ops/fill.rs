// ============================================================================
// FLOOD FILL: 4-connected bucket fill inside one square
// ============================================================================

use std::collections::BTreeSet;

use crate::color::Color;
use crate::error::{QuiltError, Result};
use crate::grid::PixelGrid;

/// Collect the 4-connected region of cells sharing the seed's color.
/// Returns a flat `size*size` mask (true = in region).
///
/// DFS over a Vec stack of flat indices; the mask doubles as the visited set,
/// so every cell is pushed at most once.
fn region_mask(grid: &PixelGrid, start_row: usize, start_col: usize) -> Vec<bool> {
    let n = grid.size();
    let mut mask = vec![false; n * n];
    let target = grid.at(start_row, start_col);

    let seed = start_row * n + start_col;
    let mut stack: Vec<usize> = Vec::with_capacity(n * n);
    mask[seed] = true;
    stack.push(seed);

    while let Some(idx) = stack.pop() {
        let row = idx / n;
        let col = idx % n;

        // Up
        if row > 0 {
            let ni = idx - n;
            if !mask[ni] && grid.at(row - 1, col) == target {
                mask[ni] = true;
                stack.push(ni);
            }
        }
        // Down
        if row + 1 < n {
            let ni = idx + n;
            if !mask[ni] && grid.at(row + 1, col) == target {
                mask[ni] = true;
                stack.push(ni);
            }
        }
        // Left
        if col > 0 {
            let ni = idx - 1;
            if !mask[ni] && grid.at(row, col - 1) == target {
                mask[ni] = true;
                stack.push(ni);
            }
        }
        // Right
        if col + 1 < n {
            let ni = idx + 1;
            if !mask[ni] && grid.at(row, col + 1) == target {
                mask[ni] = true;
                stack.push(ni);
            }
        }
    }

    mask
}

fn check_seed(grid: &PixelGrid, row: usize, col: usize) -> Result<()> {
    if grid.in_bounds(row, col) {
        Ok(())
    } else {
        Err(QuiltError::invalid(format!(
            "fill seed ({}, {}) outside {}×{} grid",
            row,
            col,
            grid.size(),
            grid.size()
        )))
    }
}

/// Recolor the region around `(row, col)` with `fill`.
///
/// Seeding on a pixel that already has `fill` returns an identical grid.
pub fn flood_fill(grid: &PixelGrid, row: usize, col: usize, fill: Color) -> Result<PixelGrid> {
    check_seed(grid, row, col)?;
    let mut out = grid.clone();
    if grid.at(row, col) == fill {
        return Ok(out);
    }

    let n = grid.size();
    let mask = region_mask(grid, row, col);
    for (idx, hit) in mask.iter().enumerate() {
        if *hit {
            out.put(idx / n, idx % n, fill);
        }
    }
    Ok(out)
}

/// Cells a [`flood_fill`] with `fill` would change, without mutating.
/// Empty when the hovered pixel already has `fill`.
pub fn preview_fill(
    grid: &PixelGrid,
    row: usize,
    col: usize,
    fill: Color,
) -> Result<BTreeSet<(usize, usize)>> {
    check_seed(grid, row, col)?;
    if grid.at(row, col) == fill {
        return Ok(BTreeSet::new());
    }

    let n = grid.size();
    let mask = region_mask(grid, row, col);
    Ok(mask
        .iter()
        .enumerate()
        .filter(|(_, hit)| **hit)
        .map(|(idx, _)| (idx / n, idx % n))
        .collect())
}
