// ============================================================================
// TRANSFORM OPERATIONS: rotate and clear a single square
// ============================================================================

use crate::color::Color;
use crate::grid::PixelGrid;

/// Rotate 90° clockwise: `(r, c) -> (c, N-1-r)`.
///
/// The result is written into a freshly cleared grid, so every one of the N²
/// cells is overwritten.
pub fn rotate_90cw(grid: &PixelGrid, background: Color) -> PixelGrid {
    let n = grid.size();
    let mut out = PixelGrid::filled(n, background);
    for row in 0..n {
        for col in 0..n {
            out.put(col, n - 1 - row, grid.at(row, col));
        }
    }
    out
}

/// Rotate 90° counter-clockwise: `(r, c) -> (N-1-c, r)`.
pub fn rotate_90ccw(grid: &PixelGrid, background: Color) -> PixelGrid {
    let n = grid.size();
    let mut out = PixelGrid::filled(n, background);
    for row in 0..n {
        for col in 0..n {
            out.put(n - 1 - col, row, grid.at(row, col));
        }
    }
    out
}

/// A grid of the same size with every pixel set to `background`.
pub fn cleared(grid: &PixelGrid, background: Color) -> PixelGrid {
    PixelGrid::filled(grid.size(), background)
}
