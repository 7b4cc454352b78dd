//! Property tests for the single-square editing algorithms.
//!
//! 1. A fill changes exactly the cells its preview reports
//! 2. Filling twice with the same color changes nothing the second time
//! 3. Rotating four times is the identity
//! 4. Clockwise then counter-clockwise is the identity

use pixel_quilt::ops::fill::{flood_fill, preview_fill};
use pixel_quilt::ops::transform::{rotate_90ccw, rotate_90cw};
use pixel_quilt::{Color, PixelGrid};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

/// Few distinct colors so regions actually form.
fn color_strategy() -> impl Strategy<Value = Color> {
    prop_oneof![
        Just(Color::BACKGROUND),
        Just(Color::BLACK),
        Just(Color::rgb(0xEA, 0x68, 0x47)),
        Just(Color::rgb(0x89, 0xB9, 0xDA)),
    ]
}

fn grid_strategy() -> impl Strategy<Value = PixelGrid> {
    (1usize..=8).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(color_strategy(), n), n)
            .prop_map(|rows| PixelGrid::from_rows(rows).expect("square rows"))
    })
}

/// A grid plus an in-bounds seed.
fn seeded_grid() -> impl Strategy<Value = (PixelGrid, usize, usize)> {
    grid_strategy().prop_flat_map(|g| {
        let n = g.size();
        (Just(g), 0..n, 0..n)
    })
}

fn changed_cells(before: &PixelGrid, after: &PixelGrid) -> Vec<(usize, usize)> {
    let n = before.size();
    let mut out = Vec::new();
    for r in 0..n {
        for c in 0..n {
            if before.get(r, c).unwrap() != after.get(r, c).unwrap() {
                out.push((r, c));
            }
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════
// Flood fill
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn preview_matches_changed_cells((grid, r, c) in seeded_grid(), fill in color_strategy()) {
        let preview = preview_fill(&grid, r, c, fill).unwrap();
        let filled = flood_fill(&grid, r, c, fill).unwrap();
        let changed = changed_cells(&grid, &filled);
        prop_assert_eq!(preview.into_iter().collect::<Vec<_>>(), changed);
    }

    #[test]
    fn fill_is_idempotent((grid, r, c) in seeded_grid(), fill in color_strategy()) {
        let once = flood_fill(&grid, r, c, fill).unwrap();
        let twice = flood_fill(&once, r, c, fill).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn fill_never_touches_other_colors((grid, r, c) in seeded_grid(), fill in color_strategy()) {
        let target = grid.get(r, c).unwrap();
        let filled = flood_fill(&grid, r, c, fill).unwrap();
        for (row, col) in changed_cells(&grid, &filled) {
            prop_assert_eq!(grid.get(row, col).unwrap(), target);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rotation
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn four_rotations_are_identity(grid in grid_strategy()) {
        let mut g = grid.clone();
        for _ in 0..4 {
            g = rotate_90cw(&g, Color::BACKGROUND);
        }
        prop_assert_eq!(g, grid);
    }

    #[test]
    fn cw_then_ccw_is_identity(grid in grid_strategy()) {
        let back = rotate_90ccw(&rotate_90cw(&grid, Color::BACKGROUND), Color::BACKGROUND);
        prop_assert_eq!(back, grid);
    }
}
