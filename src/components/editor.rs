use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::color::Color;
use crate::components::history::HistoryManager;
use crate::components::timer::{Debounce, Timed};
use crate::error::{QuiltError, Result};
use crate::grid::{PixelGrid, Quilt};
use crate::ops::fill::{flood_fill, preview_fill};
use crate::ops::halo::{HaloView, build_halo};
use crate::ops::seam::{Edge, seam_matches};
use crate::ops::transform::{cleared, rotate_90ccw, rotate_90cw};

// ============================================================================
// TOOL STATE
// ============================================================================

/// The fixed drawing palette.  The first entry is the initial selection.
pub const PALETTE: [Color; 8] = [
    Color::rgb(0x75, 0x88, 0x59),
    Color::rgb(0xE0, 0xC8, 0x77),
    Color::rgb(0xEA, 0x68, 0x47),
    Color::rgb(0x89, 0xB9, 0xDA),
    Color::rgb(0xC7, 0xCB, 0xA3),
    Color::rgb(237, 232, 231),
    Color::rgb(0xE9, 0x9A, 0xA7),
    Color::rgb(0x48, 0x4D, 0x88),
];

/// Quiet period that ends a drawing stroke.
pub const STROKE_DEBOUNCE: Duration = Duration::from_millis(500);
/// Length of the bucket-fill flash.
pub const FLASH_DURATION: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditTool {
    #[default]
    Draw,
    Bucket,
}

impl EditTool {
    pub fn label(&self) -> &'static str {
        match self {
            EditTool::Draw => "Draw",
            EditTool::Bucket => "Fill",
        }
    }
}

/// Per-device editor parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    /// Halo band thickness H.  2 on small touch screens, 4 on desktop.
    pub halo_depth: usize,
    /// Color used by `clear` and for freshly rotated grids.
    pub background: Color,
    /// Halo color where a neighbor square does not exist.
    pub halo_fill: Color,
    pub max_history: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            halo_depth: 4,
            background: Color::BACKGROUND,
            halo_fill: Color::HALO_FILL,
            max_history: 50,
        }
    }
}

// ============================================================================
// EDIT SESSION: one square's working copy while the editor is open
// ============================================================================

pub struct EditSession {
    index: usize,
    working: PixelGrid,
    config: EditorConfig,
    history: HistoryManager<PixelGrid>,
    stroke: Debounce,
    pub color: Color,
    pub tool: EditTool,
    hover_preview: BTreeSet<(usize, usize)>,
    flash: Option<Timed<()>>,
    seam_matches: usize,
}

impl EditSession {
    /// Open square `index` of `quilt` for editing.  The quilt is not retained;
    /// the session works on its own copy.
    pub fn open(quilt: &Quilt, index: usize, config: EditorConfig) -> Result<Self> {
        let working = quilt.square(index)?.clone();
        if config.halo_depth > working.size() {
            return Err(QuiltError::invalid(format!(
                "halo depth {} exceeds square size {}",
                config.halo_depth,
                working.size()
            )));
        }
        Ok(Self {
            index,
            working,
            config,
            history: HistoryManager::new(config.max_history),
            stroke: Debounce::new(STROKE_DEBOUNCE),
            color: PALETTE[0],
            tool: EditTool::default(),
            hover_preview: BTreeSet::new(),
            flash: None,
            seam_matches: 0,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn working(&self) -> &PixelGrid {
        &self.working
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn seam_matches(&self) -> usize {
        self.seam_matches
    }

    /// Composite of the working copy and its neighbors from `quilt`.
    pub fn halo(&self, quilt: &Quilt) -> Result<HaloView> {
        build_halo(
            self.index,
            &self.working,
            quilt,
            self.config.halo_depth,
            self.config.halo_fill,
        )
    }

    fn check(&self, row: usize, col: usize) -> Result<()> {
        if self.working.in_bounds(row, col) {
            Ok(())
        } else {
            Err(QuiltError::invalid(format!(
                "pixel ({}, {}) outside {}×{} grid",
                row,
                col,
                self.working.size(),
                self.working.size()
            )))
        }
    }

    fn checkpoint(&mut self, description: &str) {
        self.history.push(description, self.working.clone());
    }

    // ------------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------------

    /// Paint one pixel.  The first draw of a stroke pushes one checkpoint;
    /// draws that keep arriving within [`STROKE_DEBOUNCE`] join the same stroke.
    pub fn draw(&mut self, row: usize, col: usize, color: Color, now: Instant) -> Result<()> {
        self.check(row, col)?;
        self.stroke.poll(now);
        if !self.stroke.is_active(now) {
            self.checkpoint("Draw");
        }
        self.stroke.touch(now);
        self.working.put(row, col, color);
        Ok(())
    }

    /// End the current stroke now (pointer released or editor torn down).
    pub fn end_stroke(&mut self) {
        self.stroke.cancel();
    }

    pub fn in_stroke(&self, now: Instant) -> bool {
        self.stroke.is_active(now)
    }

    /// Compare a just-painted pixel against the facing edge of its neighbors
    /// in `quilt`; every matching edge bumps the session's seam counter.
    pub fn check_seams(&mut self, quilt: &Quilt, row: usize, col: usize) -> Result<Vec<Edge>> {
        self.check(row, col)?;
        let edges = seam_matches(quilt, self.index, row, col, self.working.at(row, col))?;
        self.seam_matches += edges.len();
        Ok(edges)
    }

    pub fn bucket_fill(&mut self, row: usize, col: usize, color: Color, now: Instant) -> Result<()> {
        self.check(row, col)?;
        self.end_stroke();
        self.checkpoint("Fill");
        self.working = flood_fill(&self.working, row, col, color)?;
        self.hover_preview.clear();
        self.flash = Some(Timed::new((), now, FLASH_DURATION));
        Ok(())
    }

    pub fn is_flashing(&self, now: Instant) -> bool {
        self.flash.as_ref().is_some_and(|f| f.is_live(now))
    }

    /// 0 when a flash starts, 1 once it is over (or none ran).
    pub fn flash_progress(&self, now: Instant) -> f32 {
        self.flash.as_ref().map_or(1.0, |f| f.progress(now))
    }

    /// Update the bucket preview for the hovered pixel.  Only the bucket tool
    /// shows a preview.
    pub fn hover(&mut self, row: usize, col: usize) -> Result<()> {
        self.check(row, col)?;
        self.hover_preview = match self.tool {
            EditTool::Bucket => preview_fill(&self.working, row, col, self.color)?,
            EditTool::Draw => BTreeSet::new(),
        };
        Ok(())
    }

    pub fn clear_hover(&mut self) {
        self.hover_preview.clear();
    }

    pub fn hover_preview(&self) -> &BTreeSet<(usize, usize)> {
        &self.hover_preview
    }

    // ------------------------------------------------------------------------
    // Whole-square operations
    // ------------------------------------------------------------------------

    pub fn rotate_clockwise(&mut self) {
        self.end_stroke();
        self.checkpoint("Rotate right");
        self.working = rotate_90cw(&self.working, self.config.background);
        self.hover_preview.clear();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.end_stroke();
        self.checkpoint("Rotate left");
        self.working = rotate_90ccw(&self.working, self.config.background);
        self.hover_preview.clear();
    }

    pub fn clear(&mut self) {
        self.end_stroke();
        self.checkpoint("Clear");
        self.working = cleared(&self.working, self.config.background);
        self.hover_preview.clear();
    }

    /// Restore the most recent checkpoint.  No-op on an empty history.
    pub fn local_undo(&mut self) -> bool {
        self.end_stroke();
        match self.history.undo() {
            Some(checkpoint) => {
                self.working = checkpoint.state;
                self.hover_preview.clear();
                true
            }
            None => false,
        }
    }

    /// Hand the working copy back.  Persisting it is the caller's job.
    pub fn save(self) -> PixelGrid {
        self.working
    }

    /// Discard the working copy.
    pub fn close(self) {}
}
