// ============================================================================
// HALO VIEW: a square plus read-only bands sampled from its 8 neighbors
// ============================================================================

use crate::color::Color;
use crate::error::{QuiltError, Result};
use crate::grid::{PixelGrid, Quilt};

/// What a display cell represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    /// Part of the square being edited, at its own row/col.
    Editable { row: usize, col: usize },
    /// Read-only border pixel.
    Halo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaloCell {
    pub color: Color,
    pub kind: CellKind,
}

impl HaloCell {
    pub fn is_halo(&self) -> bool {
        matches!(self.kind, CellKind::Halo)
    }
}

/// (N + 2H) × (N + 2H) composite used for rendering and hit-testing.
#[derive(Clone, Debug, PartialEq)]
pub struct HaloView {
    side: usize,
    depth: usize,
    cells: Vec<HaloCell>,
}

impl HaloView {
    /// Cells per side, `N + 2H`.
    pub fn side(&self) -> usize {
        self.side
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&HaloCell> {
        if row < self.side && col < self.side {
            self.cells.get(row * self.side + col)
        } else {
            None
        }
    }

    /// Editable coordinates under a display cell, `None` for halo cells.
    pub fn editable_at(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        match self.cell(row, col)?.kind {
            CellKind::Editable { row, col } => Some((row, col)),
            CellKind::Halo => None,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[HaloCell]> {
        self.cells.chunks(self.side)
    }

    fn set(&mut self, row: usize, col: usize, cell: HaloCell) {
        self.cells[row * self.side + col] = cell;
    }
}

/// Copy an `h × w` block starting at `(src_row, src_col)` of `src` into the
/// view at `(dst_row, dst_col)` as halo cells.
fn blit_halo(
    view: &mut HaloView,
    src: &PixelGrid,
    (src_row, src_col): (usize, usize),
    (dst_row, dst_col): (usize, usize),
    (h, w): (usize, usize),
) {
    for r in 0..h {
        for c in 0..w {
            view.set(
                dst_row + r,
                dst_col + c,
                HaloCell {
                    color: src.at(src_row + r, src_col + c),
                    kind: CellKind::Halo,
                },
            );
        }
    }
}

/// Build the halo view for square `index`, using `working` for the center
/// and `quilt` for neighbor data.  Missing neighbors render as `default_fill`.
pub fn build_halo(
    index: usize,
    working: &PixelGrid,
    quilt: &Quilt,
    depth: usize,
    default_fill: Color,
) -> Result<HaloView> {
    let n = quilt.grid_size();
    if index >= quilt.len() {
        return Err(QuiltError::invalid(format!(
            "square {} out of range (quilt has {})",
            index,
            quilt.len()
        )));
    }
    if working.size() != n {
        return Err(QuiltError::invalid(format!(
            "working grid is {}×{}, quilt squares are {}×{}",
            working.size(),
            working.size(),
            n,
            n
        )));
    }
    if depth > n {
        return Err(QuiltError::invalid(format!(
            "halo depth {} exceeds square size {}",
            depth, n
        )));
    }

    let h = depth;
    let side = n + 2 * h;
    let mut view = HaloView {
        side,
        depth,
        cells: vec![
            HaloCell {
                color: default_fill,
                kind: CellKind::Halo,
            };
            side * side
        ],
    };

    // Center: the editable square
    for row in 0..n {
        for col in 0..n {
            view.set(
                row + h,
                col + h,
                HaloCell {
                    color: working.at(row, col),
                    kind: CellKind::Editable { row, col },
                },
            );
        }
    }

    if h == 0 {
        return Ok(view);
    }

    let nb = quilt.neighbors(index);
    let squares = quilt.squares();
    let far = n - h; // first row/col of the last H rows/cols

    // Edges
    if let Some(i) = nb.top {
        blit_halo(&mut view, &squares[i], (far, 0), (0, h), (h, n));
    }
    if let Some(i) = nb.bottom {
        blit_halo(&mut view, &squares[i], (0, 0), (h + n, h), (h, n));
    }
    if let Some(i) = nb.left {
        blit_halo(&mut view, &squares[i], (0, far), (h, 0), (n, h));
    }
    if let Some(i) = nb.right {
        blit_halo(&mut view, &squares[i], (0, 0), (h, h + n), (n, h));
    }

    // Corners
    if let Some(i) = nb.top_left {
        blit_halo(&mut view, &squares[i], (far, far), (0, 0), (h, h));
    }
    if let Some(i) = nb.top_right {
        blit_halo(&mut view, &squares[i], (far, 0), (0, h + n), (h, h));
    }
    if let Some(i) = nb.bottom_left {
        blit_halo(&mut view, &squares[i], (0, far), (h + n, 0), (h, h));
    }
    if let Some(i) = nb.bottom_right {
        blit_halo(&mut view, &squares[i], (0, 0), (h + n, h + n), (h, h));
    }

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::QuiltLayout;

    fn tagged_quilt() -> Quilt {
        // Each square is a solid color derived from its index
        let layout = QuiltLayout::builder().squares(9).columns(3).grid_size(4).build().unwrap();
        let mut quilt = Quilt::blank(layout);
        for i in 0..9 {
            quilt
                .replace(i, PixelGrid::filled(4, Color::rgb(i as u8 * 10, 0, 0)))
                .unwrap();
        }
        quilt
    }

    #[test]
    fn first_row_square_has_default_top_band() {
        let quilt = tagged_quilt();
        let working = quilt.square(1).unwrap().clone();
        let view = build_halo(1, &working, &quilt, 2, Color::HALO_FILL).unwrap();
        assert_eq!(view.side(), 8);
        for r in 0..2 {
            for c in 0..8 {
                let cell = view.cell(r, c).unwrap();
                assert!(cell.is_halo());
                assert_eq!(cell.color, Color::HALO_FILL, "top band ({}, {})", r, c);
            }
        }
    }

    #[test]
    fn center_square_samples_all_eight_neighbors() {
        let quilt = tagged_quilt();
        let working = quilt.square(4).unwrap().clone();
        let view = build_halo(4, &working, &quilt, 1, Color::HALO_FILL).unwrap();
        let c = |i: u8| Color::rgb(i * 10, 0, 0);
        assert_eq!(view.cell(0, 0).unwrap().color, c(0));
        assert_eq!(view.cell(0, 2).unwrap().color, c(1));
        assert_eq!(view.cell(0, 5).unwrap().color, c(2));
        assert_eq!(view.cell(2, 0).unwrap().color, c(3));
        assert_eq!(view.cell(2, 5).unwrap().color, c(5));
        assert_eq!(view.cell(5, 0).unwrap().color, c(6));
        assert_eq!(view.cell(5, 2).unwrap().color, c(7));
        assert_eq!(view.cell(5, 5).unwrap().color, c(8));
    }

    #[test]
    fn bands_take_the_facing_edge_of_the_neighbor() {
        let mut quilt = tagged_quilt();
        let mut above = PixelGrid::filled(4, Color::BLACK);
        above.set(3, 2, Color::rgb(1, 2, 3)).unwrap(); // last row of the top neighbor
        quilt.replace(1, above).unwrap();
        let working = quilt.square(4).unwrap().clone();
        let view = build_halo(4, &working, &quilt, 1, Color::HALO_FILL).unwrap();
        assert_eq!(view.cell(0, 1 + 2).unwrap().color, Color::rgb(1, 2, 3));
    }

    #[test]
    fn center_uses_working_copy_and_maps_back() {
        let quilt = tagged_quilt();
        let mut working = quilt.square(4).unwrap().clone();
        working.set(0, 0, Color::BLACK).unwrap();
        let view = build_halo(4, &working, &quilt, 2, Color::HALO_FILL).unwrap();
        assert_eq!(view.cell(2, 2).unwrap().color, Color::BLACK);
        assert_eq!(view.editable_at(2, 2), Some((0, 0)));
        assert_eq!(view.editable_at(5, 5), Some((3, 3)));
        assert_eq!(view.editable_at(1, 4), None);
    }

    #[test]
    fn rejects_bad_arguments() {
        let quilt = tagged_quilt();
        let working = quilt.square(0).unwrap().clone();
        assert!(build_halo(9, &working, &quilt, 1, Color::HALO_FILL).is_err());
        assert!(build_halo(0, &working, &quilt, 5, Color::HALO_FILL).is_err());
        let wrong = PixelGrid::filled(3, Color::BLACK);
        assert!(build_halo(0, &wrong, &quilt, 1, Color::HALO_FILL).is_err());
    }
}
