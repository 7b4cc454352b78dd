use std::time::{Duration, Instant};

use egui::{Pos2, Rect};

// ============================================================================
// EDGE AUTO-SCROLL: keep the grid moving while a drag hugs the viewport edge
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoScrollConfig {
    /// Height of the active band inside the top and bottom viewport edges.
    pub edge_zone: f32,
    /// Speed in points per second at the very edge.
    pub max_speed: f32,
}

impl Default for AutoScrollConfig {
    fn default() -> Self {
        Self {
            edge_zone: 60.0,
            max_speed: 900.0,
        }
    }
}

/// Signed vertical velocity for a pointer at `pointer` inside `viewport`.
/// Negative scrolls up, positive scrolls down, zero outside the edge bands.
/// Speed grows linearly with depth into the band; past the edge it is capped.
pub fn edge_velocity(config: &AutoScrollConfig, viewport: Rect, pointer: Pos2) -> f32 {
    if config.edge_zone <= 0.0 || viewport.height() <= 0.0 {
        return 0.0;
    }
    // Bands never overlap on short viewports
    let zone = config.edge_zone.min(viewport.height() / 2.0);

    let from_top = pointer.y - viewport.top();
    let from_bottom = viewport.bottom() - pointer.y;
    if from_top < zone {
        let depth = ((zone - from_top) / zone).clamp(0.0, 1.0);
        -depth * config.max_speed
    } else if from_bottom < zone {
        let depth = ((zone - from_bottom) / zone).clamp(0.0, 1.0);
        depth * config.max_speed
    } else {
        0.0
    }
}

/// Frame-driven scroller.  Active only between `start` and `stop`; the
/// owner adds each `step` result to its scroll offset.
#[derive(Clone, Debug, Default)]
pub struct AutoScroller {
    config: AutoScrollConfig,
    last_frame: Option<Instant>,
    velocity: f32,
}

impl AutoScroller {
    pub fn new(config: AutoScrollConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.last_frame = Some(now);
        self.velocity = 0.0;
    }

    pub fn stop(&mut self) {
        self.last_frame = None;
        self.velocity = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.last_frame.is_some()
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Scroll delta in points for the time since the previous step.
    pub fn step(&mut self, viewport: Rect, pointer: Pos2, now: Instant) -> f32 {
        let Some(last) = self.last_frame else {
            return 0.0;
        };
        self.velocity = edge_velocity(&self.config, viewport, pointer);
        // Long stalls (window hidden, debugger) must not jump the grid
        let dt = now
            .saturating_duration_since(last)
            .min(Duration::from_millis(100))
            .as_secs_f32();
        self.last_frame = Some(now);
        self.velocity * dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn viewport() -> Rect {
        Rect::from_min_max(pos2(0.0, 100.0), pos2(400.0, 700.0))
    }

    #[test]
    fn middle_of_viewport_does_not_scroll() {
        let cfg = AutoScrollConfig::default();
        assert_eq!(edge_velocity(&cfg, viewport(), pos2(200.0, 400.0)), 0.0);
    }

    #[test]
    fn velocity_grows_toward_the_edge() {
        let cfg = AutoScrollConfig::default();
        let near = edge_velocity(&cfg, viewport(), pos2(10.0, 690.0));
        let far = edge_velocity(&cfg, viewport(), pos2(10.0, 650.0));
        assert!(near > far && far > 0.0);
        let up = edge_velocity(&cfg, viewport(), pos2(10.0, 100.0));
        assert_eq!(up, -cfg.max_speed);
        let beyond = edge_velocity(&cfg, viewport(), pos2(10.0, 900.0));
        assert_eq!(beyond, cfg.max_speed);
    }

    #[test]
    fn stopped_scroller_yields_nothing() {
        let t0 = Instant::now();
        let mut s = AutoScroller::new(AutoScrollConfig::default());
        assert_eq!(s.step(viewport(), pos2(0.0, 700.0), t0), 0.0);

        s.start(t0);
        let dy = s.step(viewport(), pos2(0.0, 700.0), t0 + Duration::from_millis(50));
        assert!((dy - 45.0).abs() < 0.01, "{}", dy);
        s.stop();
        assert!(!s.is_running());
        assert_eq!(s.step(viewport(), pos2(0.0, 700.0), t0 + Duration::from_secs(1)), 0.0);
    }
}
