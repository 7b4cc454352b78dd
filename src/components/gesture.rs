//! Tap / scroll / drag disambiguation for the quilt grid, plus the
//! drag-to-copy controller that runs once a drag has been committed.
//!
//! A gesture starts `Undecided` at pointer-down and commits to exactly one of
//! `Tap`, `Scroll` or `Drag`.  The first commit wins and holds until the
//! pointer is released.

use std::time::{Duration, Instant};

use egui::{Pos2, Vec2};

use crate::components::timer::Deadline;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Thresholds for gesture decisions, in screen points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureConfig {
    /// Displacement on either axis that commits a drag in `TouchMode::Drag`.
    pub drag_threshold: f32,
    /// Displacement at or below which movement is treated as finger jitter.
    pub jitter_threshold: f32,
    /// Stationary hold that forces a drag in `TouchMode::Scroll`.
    pub long_press: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 25.0,
            jitter_threshold: 10.0,
            long_press: Duration::from_millis(350),
        }
    }
}

/// How the grid surface interprets touch movement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TouchMode {
    /// Movement past the drag threshold starts a copy drag.
    #[default]
    Drag,
    /// Movement scrolls; a long press starts a copy drag.
    Scroll,
}

impl TouchMode {
    pub fn label(&self) -> &'static str {
        match self {
            TouchMode::Drag => "Drag mode",
            TouchMode::Scroll => "Scroll mode",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TouchMode::Drag => TouchMode::Scroll,
            TouchMode::Scroll => TouchMode::Drag,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drag" => Some(TouchMode::Drag),
            "scroll" => Some(TouchMode::Scroll),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TouchMode::Drag => "drag",
            TouchMode::Scroll => "scroll",
        }
    }
}

// ============================================================================
// GESTURE TRACKER
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GesturePhase {
    /// No pointer down, or not yet decided.
    #[default]
    Undecided,
    Tap,
    Scroll,
    Drag,
}

impl GesturePhase {
    pub fn is_committed(&self) -> bool {
        !matches!(self, GesturePhase::Undecided)
    }
}

#[derive(Clone, Debug, Default)]
pub struct GestureTracker {
    config: GestureConfig,
    mode: TouchMode,
    origin: Option<Pos2>,
    phase: GesturePhase,
    long_press: Deadline,
}

impl GestureTracker {
    pub fn new(config: GestureConfig, mode: TouchMode) -> Self {
        Self {
            config,
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> TouchMode {
        self.mode
    }

    /// Takes effect from the next pointer-down.
    pub fn set_mode(&mut self, mode: TouchMode) {
        self.mode = mode;
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    pub fn is_tracking(&self) -> bool {
        self.origin.is_some()
    }

    pub fn pointer_down(&mut self, pos: Pos2, now: Instant) {
        self.origin = Some(pos);
        self.phase = GesturePhase::Undecided;
        self.long_press.cancel();
        if self.mode == TouchMode::Scroll {
            self.long_press.arm(now, self.config.long_press);
        }
    }

    /// Feed a pointer position; returns the (possibly newly committed) phase.
    pub fn pointer_move(&mut self, pos: Pos2, now: Instant) -> GesturePhase {
        let Some(origin) = self.origin else {
            return self.phase;
        };
        // A hold that expired before this move still wins
        if self.tick(now) == GesturePhase::Drag || self.phase.is_committed() {
            return self.phase;
        }

        let delta = pos - origin;
        let travel = delta.x.abs().max(delta.y.abs());
        if travel <= self.config.jitter_threshold {
            return self.phase;
        }

        match self.mode {
            TouchMode::Drag => {
                if travel > self.config.drag_threshold {
                    self.commit(GesturePhase::Drag);
                }
            }
            TouchMode::Scroll => self.commit(GesturePhase::Scroll),
        }
        self.phase
    }

    /// Poll the long-press deadline.
    pub fn tick(&mut self, now: Instant) -> GesturePhase {
        if self.origin.is_some() && !self.phase.is_committed() && self.long_press.fire(now) {
            self.commit(GesturePhase::Drag);
        }
        self.phase
    }

    /// Finish the gesture.  An undecided gesture resolves to `Tap`.
    pub fn pointer_up(&mut self, now: Instant) -> GesturePhase {
        if self.origin.is_none() {
            return GesturePhase::Undecided;
        }
        self.tick(now);
        let result = match self.phase {
            GesturePhase::Undecided => GesturePhase::Tap,
            committed => committed,
        };
        self.reset();
        result
    }

    pub fn reset(&mut self) {
        self.origin = None;
        self.phase = GesturePhase::Undecided;
        self.long_press.cancel();
    }

    fn commit(&mut self, phase: GesturePhase) {
        if !self.phase.is_committed() {
            self.phase = phase;
            self.long_press.cancel();
        }
    }
}

// ============================================================================
// DRAG-TO-COPY
// ============================================================================

/// A completed drop: copy square `from` onto square `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Clone, Debug, Default)]
pub struct DragCopy {
    source: Option<usize>,
    start: Pos2,
    ghost: Pos2,
    candidate: Option<usize>,
}

impl DragCopy {
    pub fn begin(&mut self, source: usize, pos: Pos2) {
        self.source = Some(source);
        self.start = pos;
        self.ghost = pos;
        self.candidate = None;
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<usize> {
        self.source
    }

    pub fn start(&self) -> Pos2 {
        self.start
    }

    pub fn ghost(&self) -> Pos2 {
        self.ghost
    }

    /// Offset of the ghost from where the drag started.
    pub fn offset(&self) -> Vec2 {
        self.ghost - self.start
    }

    pub fn candidate(&self) -> Option<usize> {
        self.candidate
    }

    /// Move the ghost and record the square under the pointer, if any.
    pub fn update(&mut self, pos: Pos2, hovered: Option<usize>) {
        if self.source.is_none() {
            return;
        }
        self.ghost = pos;
        self.candidate = hovered;
    }

    /// End the drag.  Returns a copy request only for a different target;
    /// the controller is reset either way.
    pub fn release(&mut self) -> Option<CopyRequest> {
        let request = match (self.source, self.candidate) {
            (Some(from), Some(to)) if from != to => Some(CopyRequest { from, to }),
            _ => None,
        };
        *self = Self::default();
        request
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}

/// Desktop drag handle: the bottom-left corner of a square, 20% of each side.
/// `local` is relative to the square's top-left corner.
pub fn in_drag_hotspot(local: Vec2, square_size: Vec2) -> bool {
    local.x >= 0.0
        && local.y <= square_size.y
        && local.x < square_size.x * 0.2
        && local.y > square_size.y * 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{pos2, vec2};

    const MS: Duration = Duration::from_millis(1);

    fn tracker(mode: TouchMode) -> GestureTracker {
        GestureTracker::new(GestureConfig::default(), mode)
    }

    #[test]
    fn drag_mode_commits_past_threshold() {
        let t0 = Instant::now();
        let mut g = tracker(TouchMode::Drag);
        g.pointer_down(pos2(100.0, 100.0), t0);
        assert_eq!(g.pointer_move(pos2(105.0, 100.0), t0), GesturePhase::Undecided);
        assert_eq!(g.pointer_move(pos2(120.0, 100.0), t0), GesturePhase::Undecided);
        assert_eq!(g.pointer_move(pos2(100.0, 126.0), t0), GesturePhase::Drag);
        assert_eq!(g.pointer_up(t0), GesturePhase::Drag);
        assert!(!g.is_tracking());
    }

    #[test]
    fn release_while_undecided_is_tap() {
        let t0 = Instant::now();
        let mut g = tracker(TouchMode::Drag);
        g.pointer_down(pos2(0.0, 0.0), t0);
        g.pointer_move(pos2(3.0, -4.0), t0 + 10 * MS);
        assert_eq!(g.pointer_up(t0 + 2000 * MS), GesturePhase::Tap);
    }

    #[test]
    fn scroll_mode_commits_on_movement_past_jitter() {
        let t0 = Instant::now();
        let mut g = tracker(TouchMode::Scroll);
        g.pointer_down(pos2(0.0, 0.0), t0);
        assert_eq!(g.pointer_move(pos2(0.0, 8.0), t0 + 50 * MS), GesturePhase::Undecided);
        assert_eq!(g.pointer_move(pos2(0.0, 11.0), t0 + 60 * MS), GesturePhase::Scroll);
        // long press deadline passing later changes nothing
        assert_eq!(g.tick(t0 + 1000 * MS), GesturePhase::Scroll);
        assert_eq!(g.pointer_move(pos2(0.0, 0.0), t0 + 1000 * MS), GesturePhase::Scroll);
    }

    #[test]
    fn scroll_mode_long_press_wins_when_first() {
        let t0 = Instant::now();
        let mut g = tracker(TouchMode::Scroll);
        g.pointer_down(pos2(0.0, 0.0), t0);
        g.pointer_move(pos2(4.0, 4.0), t0 + 100 * MS);
        assert_eq!(g.tick(t0 + 349 * MS), GesturePhase::Undecided);
        assert_eq!(g.tick(t0 + 350 * MS), GesturePhase::Drag);
        assert_eq!(g.pointer_move(pos2(0.0, 80.0), t0 + 400 * MS), GesturePhase::Drag);
    }

    #[test]
    fn late_move_after_expired_hold_still_drags() {
        let t0 = Instant::now();
        let mut g = tracker(TouchMode::Scroll);
        g.pointer_down(pos2(0.0, 0.0), t0);
        assert_eq!(g.pointer_move(pos2(0.0, 50.0), t0 + 500 * MS), GesturePhase::Drag);
    }

    #[test]
    fn same_inputs_same_decision() {
        let t0 = Instant::now();
        let run = || {
            let mut g = tracker(TouchMode::Scroll);
            g.pointer_down(pos2(10.0, 10.0), t0);
            g.pointer_move(pos2(12.0, 15.0), t0 + 20 * MS);
            g.pointer_move(pos2(30.0, 15.0), t0 + 40 * MS);
            g.pointer_up(t0 + 60 * MS)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn drag_copy_only_reports_different_target() {
        let mut d = DragCopy::default();
        d.begin(3, pos2(10.0, 10.0));
        d.update(pos2(40.0, 10.0), Some(3));
        assert_eq!(d.release(), None);
        assert!(!d.is_active());

        d.begin(3, pos2(10.0, 10.0));
        d.update(pos2(40.0, 12.0), Some(4));
        assert_eq!(d.offset(), vec2(30.0, 2.0));
        assert_eq!(d.release(), Some(CopyRequest { from: 3, to: 4 }));
        assert_eq!(d.source(), None);

        d.begin(1, pos2(0.0, 0.0));
        d.update(pos2(5.0, 5.0), None);
        assert_eq!(d.release(), None);
    }

    #[test]
    fn hotspot_is_bottom_left_corner() {
        let size = vec2(100.0, 100.0);
        assert!(in_drag_hotspot(vec2(5.0, 95.0), size));
        assert!(!in_drag_hotspot(vec2(25.0, 95.0), size));
        assert!(!in_drag_hotspot(vec2(5.0, 50.0), size));
        assert!(!in_drag_hotspot(vec2(-1.0, 95.0), size));
    }

    #[test]
    fn touch_mode_parses_and_toggles() {
        assert_eq!(TouchMode::parse(" Scroll "), Some(TouchMode::Scroll));
        assert_eq!(TouchMode::parse("fling"), None);
        assert_eq!(TouchMode::Drag.toggled(), TouchMode::Scroll);
    }
}
