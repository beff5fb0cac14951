//! Scroll position and velocity of the carousel track.
//!
//! Timestamps are milliseconds from the caller's frame clock; velocities are
//! px/s. The track loops, so every position update is taken modulo its length.

use crate::config::CarouselConfig;

/// Euclidean modulo that tolerates an empty track.
pub fn wrap(n: f64, m: f64) -> f64 {
    if m <= 0.0 {
        return 0.0;
    }
    ((n % m) + m) % m
}

/// Velocity that, under per-frame friction at 60 fps, travels `distance`
/// before coming to rest: the geometric series `v/60 * Σ f^k = v / ((1-f)*60)`.
pub fn impulse_for_distance(distance: f64, friction: f64) -> f64 {
    distance * (1.0 - friction) * 60.0
}

#[derive(Debug, Clone)]
struct Drag {
    start_x: f64,
    last_x: f64,
    last_t: f64,
    speed: f64,
    moved: bool,
}

/// How a pointer press ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Release {
    /// Pointer barely moved: treat as a click at this position.
    Click { x: f64 },
    /// Drag ended; the drag speed was handed to the free decay.
    Fling { velocity: f64 },
}

#[derive(Debug, Clone)]
pub struct Motion {
    scroll: f64,
    velocity: f64,
    friction: f64,
    wheel_sensitivity: f64,
    drag_sensitivity: f64,
    epsilon: f64,
    click_threshold: f64,
    drag: Option<Drag>,
}

impl Motion {
    pub fn new(config: &CarouselConfig) -> Self {
        Self {
            scroll: 0.0,
            velocity: 0.0,
            friction: config.friction,
            wheel_sensitivity: config.wheel_sensitivity,
            drag_sensitivity: config.drag_sensitivity,
            epsilon: config.velocity_epsilon,
            click_threshold: config.click_threshold_px,
            drag: None,
        }
    }

    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_at_rest(&self) -> bool {
        self.velocity == 0.0 && self.drag.is_none()
    }

    /// Keep the same relative position when the track length changes.
    pub fn rescale(&mut self, old_track: f64, new_track: f64) {
        let ratio = if old_track > 0.0 { self.scroll / old_track } else { 0.0 };
        self.scroll = wrap(ratio * new_track, new_track);
    }

    /// Integrate one frame of free decay. While a drag is active the
    /// pointer owns the position and velocity is left untouched.
    pub fn step(&mut self, dt: f64, track: f64) {
        if self.drag.is_some() || dt <= 0.0 {
            return;
        }
        self.scroll = wrap(self.scroll + self.velocity * dt, track);
        self.velocity *= self.friction.powf(dt * 60.0);
        if self.velocity.abs() < self.epsilon {
            self.velocity = 0.0;
        }
    }

    /// Wheel input; the dominant axis wins.
    pub fn wheel(&mut self, delta_x: f64, delta_y: f64) {
        let delta = if delta_x.abs() > delta_y.abs() { delta_x } else { delta_y };
        self.velocity += delta * self.wheel_sensitivity * 20.0;
    }

    /// Velocity kick sized to advance about `distance` before settling.
    pub fn nudge(&mut self, distance: f64) {
        self.velocity += impulse_for_distance(distance, self.friction);
    }

    pub fn pointer_down(&mut self, x: f64, t_ms: f64) {
        self.drag = Some(Drag {
            start_x: x,
            last_x: x,
            last_t: t_ms,
            speed: 0.0,
            moved: false,
        });
    }

    pub fn pointer_move(&mut self, x: f64, t_ms: f64, track: f64) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let dx = x - drag.last_x;
        let dt = (t_ms - drag.last_t).max(1.0) / 1000.0;

        if (x - drag.start_x).abs() > self.click_threshold {
            drag.moved = true;
        }

        self.scroll = wrap(self.scroll - dx * self.drag_sensitivity, track);
        drag.speed = dx / dt;
        drag.last_x = x;
        drag.last_t = t_ms;
    }

    /// End the press. Always clears the drag, whether or not it moved.
    pub fn pointer_up(&mut self, x: f64) -> Option<Release> {
        let drag = self.drag.take()?;
        if drag.moved {
            self.velocity = -drag.speed * self.drag_sensitivity;
            Some(Release::Fling {
                velocity: self.velocity,
            })
        } else {
            Some(Release::Click { x })
        }
    }

    /// Drop any in-flight drag without handing off velocity.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn stop(&mut self) {
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion() -> Motion {
        Motion::new(&CarouselConfig::default())
    }

    fn settle(m: &mut Motion, track: f64) {
        for _ in 0..10_000 {
            if m.is_at_rest() {
                return;
            }
            m.step(1.0 / 60.0, track);
        }
        panic!("motion never settled");
    }

    #[test]
    fn test_wrap_negative_and_overflow() {
        assert_eq!(wrap(-10.0, 100.0), 90.0);
        assert_eq!(wrap(250.0, 100.0), 50.0);
        assert_eq!(wrap(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_nudge_travels_about_one_distance() {
        let mut m = motion();
        m.nudge(378.0);
        settle(&mut m, 10_000.0);
        assert!((m.scroll() - 378.0).abs() < 1.0, "scroll {}", m.scroll());
    }

    #[test]
    fn test_decay_is_frame_rate_independent() {
        let mut a = motion();
        let mut b = motion();
        a.wheel(0.0, 100.0);
        b.wheel(0.0, 100.0);
        for _ in 0..60 {
            a.step(1.0 / 60.0, 1e9);
        }
        for _ in 0..30 {
            b.step(1.0 / 30.0, 1e9);
        }
        assert!((a.velocity() - b.velocity()).abs() < 1e-6);
    }

    #[test]
    fn test_wheel_uses_dominant_axis() {
        let mut m = motion();
        m.wheel(-30.0, 10.0);
        assert!((m.velocity() - (-30.0 * 0.8 * 20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_small_velocity_snaps_to_zero() {
        let mut m = motion();
        m.velocity = 0.021;
        m.step(1.0 / 60.0, 1000.0);
        assert_eq!(m.velocity(), 0.0);
    }

    #[test]
    fn test_drag_moves_scroll_directly_and_flings() {
        let mut m = motion();
        m.pointer_down(100.0, 0.0);
        m.pointer_move(90.0, 16.0, 1000.0);
        // dx = -10 px * 18 sensitivity
        assert!((m.scroll() - 180.0).abs() < 1e-9);
        // velocity integration is suspended while dragging
        m.step(1.0 / 60.0, 1000.0);
        assert!((m.scroll() - 180.0).abs() < 1e-9);

        match m.pointer_up(90.0) {
            Some(Release::Fling { velocity }) => assert!(velocity > 0.0),
            other => panic!("expected fling, got {:?}", other),
        }
        assert!(!m.is_dragging());
    }

    #[test]
    fn test_short_press_is_click_and_clears_drag() {
        let mut m = motion();
        m.pointer_down(100.0, 0.0);
        m.pointer_move(103.0, 10.0, 1000.0);
        assert_eq!(m.pointer_up(103.0), Some(Release::Click { x: 103.0 }));
        assert!(!m.is_dragging());
        assert_eq!(m.velocity(), 0.0);
    }

    #[test]
    fn test_pointer_up_without_press_is_ignored() {
        let mut m = motion();
        assert_eq!(m.pointer_up(0.0), None);
    }

    #[test]
    fn test_rescale_keeps_ratio() {
        let mut m = motion();
        m.scroll = 250.0;
        m.rescale(1000.0, 2000.0);
        assert!((m.scroll() - 500.0).abs() < 1e-9);
    }
}
