// ============================================================================
// SEAM MATCHING: does a freshly painted edge pixel line up with its neighbor?
// ============================================================================

use crate::color::Color;
use crate::error::{QuiltError, Result};
use crate::grid::Quilt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub fn label(&self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Right => "right",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
        }
    }
}

/// Edges of square `index` at which `color` painted at `(row, col)` matches
/// the facing pixel of the orthogonal neighbor.
///
/// The top edge compares against the neighbor's last row, the bottom edge
/// against its first row, left against its last column and right against its
/// first column.  Interior pixels and missing neighbors never match.
pub fn seam_matches(
    quilt: &Quilt,
    index: usize,
    row: usize,
    col: usize,
    color: Color,
) -> Result<Vec<Edge>> {
    let n = quilt.grid_size();
    if index >= quilt.len() {
        return Err(QuiltError::invalid(format!(
            "square {} out of range (quilt has {})",
            index,
            quilt.len()
        )));
    }
    if row >= n || col >= n {
        return Err(QuiltError::invalid(format!(
            "pixel ({}, {}) outside {}×{} grid",
            row, col, n, n
        )));
    }

    let nb = quilt.neighbors(index);
    let squares = quilt.squares();
    let last = n - 1;
    let mut hits = Vec::new();

    if row == 0 {
        if let Some(i) = nb.top {
            if squares[i].at(last, col) == color {
                hits.push(Edge::Top);
            }
        }
    }
    if col == last {
        if let Some(i) = nb.right {
            if squares[i].at(row, 0) == color {
                hits.push(Edge::Right);
            }
        }
    }
    if row == last {
        if let Some(i) = nb.bottom {
            if squares[i].at(0, col) == color {
                hits.push(Edge::Bottom);
            }
        }
    }
    if col == 0 {
        if let Some(i) = nb.left {
            if squares[i].at(row, last) == color {
                hits.push(Edge::Left);
            }
        }
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{PixelGrid, QuiltLayout};

    const RED: Color = Color::rgb(255, 0, 0);

    fn quilt() -> Quilt {
        let layout = QuiltLayout::builder().squares(9).columns(3).grid_size(3).build().unwrap();
        Quilt::blank(layout)
    }

    #[test]
    fn top_edge_matches_last_row_of_square_above() {
        let mut q = quilt();
        let mut above = PixelGrid::filled(3, Color::BACKGROUND);
        above.set(2, 1, RED).unwrap();
        q.replace(1, above).unwrap();
        assert_eq!(seam_matches(&q, 4, 0, 1, RED).unwrap(), vec![Edge::Top]);
        assert!(seam_matches(&q, 4, 0, 0, RED).unwrap().is_empty());
    }

    #[test]
    fn corner_pixel_can_match_two_edges() {
        let q = quilt();
        let hits = seam_matches(&q, 4, 0, 0, Color::BACKGROUND).unwrap();
        assert_eq!(hits, vec![Edge::Top, Edge::Left]);
    }

    #[test]
    fn interior_pixels_and_missing_neighbors_never_match() {
        let q = quilt();
        assert!(seam_matches(&q, 4, 1, 1, Color::BACKGROUND).unwrap().is_empty());
        // square 0 has no top or left neighbor
        assert!(seam_matches(&q, 0, 0, 0, Color::BACKGROUND).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_is_invalid() {
        let q = quilt();
        assert!(seam_matches(&q, 9, 0, 0, RED).is_err());
        assert!(seam_matches(&q, 0, 3, 0, RED).is_err());
    }
}
