//! Deadline handles for the UI's scheduled work.
//!
//! Nothing here spawns threads or registers callbacks: the owner polls with
//! the current `Instant` once per frame (or per input event), and a handle
//! that is cancelled or dropped simply never reports as due.

use std::time::{Duration, Instant};

/// A single optional point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.at = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.at, Some(at) if now >= at)
    }

    /// Disarm and return true if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.at = None;
            true
        } else {
            false
        }
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(now))
    }
}

/// Trailing-edge debounce: a burst of `touch` calls stays open until `delay`
/// passes without another touch.
#[derive(Clone, Copy, Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Deadline,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: Deadline::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Register activity.  Returns true when this touch opens a new burst.
    pub fn touch(&mut self, now: Instant) -> bool {
        let opened = !self.is_active(now);
        self.deadline.arm(now, self.delay);
        opened
    }

    /// A burst is open and its quiet period has not yet elapsed.
    pub fn is_active(&self, now: Instant) -> bool {
        self.deadline.is_armed() && !self.deadline.is_due(now)
    }

    /// Close the burst if it expired.  Returns true exactly once per expiry.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.deadline.fire(now)
    }

    pub fn cancel(&mut self) {
        self.deadline.cancel();
    }
}

/// A fixed-length visual effect such as a flash or a toast.
#[derive(Clone, Debug)]
pub struct Timed<T> {
    pub value: T,
    started: Instant,
    duration: Duration,
}

impl<T> Timed<T> {
    pub fn new(value: T, now: Instant, duration: Duration) -> Self {
        Self {
            value,
            started: now,
            duration,
        }
    }

    pub fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) < self.duration
    }

    /// Fraction of the lifetime elapsed, clamped to 0..=1.
    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started).as_secs_f32();
        (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}
