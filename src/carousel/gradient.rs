//! Two-blob animated gradient that sits behind the carousel.
//!
//! Blob centres orbit the viewport centre on slow elliptical paths. Colours
//! tween toward the palette of the active card. Drawing is throttled: fast
//! right after a retarget, slower once idle, and not at all while hidden.

use super::color::{Palette, Rgb};
use crate::config::BackgroundConfig;

pub const BASE_COLOR: Rgb = Rgb::new(0xf6, 0xf7, 0xf9);
const INITIAL_PRIMARY: Rgb = Rgb::new(240, 240, 240);
const INITIAL_SECONDARY: Rgb = Rgb::new(235, 235, 235);

const ORBIT_SPEED: f64 = 0.0002;
const PRIMARY_ALPHA: f64 = 0.85;
const SECONDARY_ALPHA: f64 = 0.70;

/// Decelerating ease: `1 - (1-t)^3`.
pub fn ease_power2_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

fn lerp_channel(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
}

fn lerp_rgb(a: Rgb, b: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp_channel(a.r, b.r, t),
        lerp_channel(a.g, b.g, t),
        lerp_channel(a.b, b.b, t),
    )
}

#[derive(Debug, Clone, Copy)]
struct Tween {
    from: Palette,
    to: Palette,
    started_ms: f64,
}

/// A radial blob: solid at the centre, linearly transparent at `radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: Rgb,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientFrame {
    pub base: Rgb,
    pub blobs: [Blob; 2],
}

impl GradientFrame {
    /// Colour at one point after compositing both blobs over the base.
    pub fn sample(&self, x: f64, y: f64) -> Rgb {
        let mut out = [self.base.r as f64, self.base.g as f64, self.base.b as f64];
        for blob in &self.blobs {
            if blob.radius <= 0.0 {
                continue;
            }
            let d = ((x - blob.x).powi(2) + (y - blob.y).powi(2)).sqrt();
            let a = blob.alpha * (1.0 - d / blob.radius).max(0.0);
            if a <= 0.0 {
                continue;
            }
            let c = [blob.color.r as f64, blob.color.g as f64, blob.color.b as f64];
            for k in 0..3 {
                out[k] = out[k] * (1.0 - a) + c[k] * a;
            }
        }
        Rgb::new(
            out[0].round() as u8,
            out[1].round() as u8,
            out[2].round() as u8,
        )
    }
}

#[derive(Debug)]
pub struct GradientBackground {
    config: BackgroundConfig,
    current: Palette,
    tween: Option<Tween>,
    fast_until_ms: f64,
    last_draw_ms: Option<f64>,
    visible: bool,
    running: bool,
}

impl GradientBackground {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            current: Palette {
                primary: INITIAL_PRIMARY,
                secondary: INITIAL_SECONDARY,
            },
            tween: None,
            fast_until_ms: 0.0,
            last_draw_ms: None,
            visible: true,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
        self.last_draw_ms = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if visible {
            self.last_draw_ms = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.running && self.visible
    }

    pub fn palette(&self) -> Palette {
        self.current
    }

    pub fn target(&self) -> Palette {
        self.tween.map(|t| t.to).unwrap_or(self.current)
    }

    /// Start a colour transition from wherever the colours are now.
    pub fn retarget(&mut self, palette: Palette, now_ms: f64) {
        self.advance(now_ms);
        if self.target() == palette {
            return;
        }
        self.tween = Some(Tween {
            from: self.current,
            to: palette,
            started_ms: now_ms,
        });
        self.fast_until_ms = now_ms + self.config.fast_window_ms as f64;
    }

    fn advance(&mut self, now_ms: f64) {
        let Some(tween) = self.tween else {
            return;
        };
        let duration = self.config.transition_ms.max(1) as f64;
        let t = (now_ms - tween.started_ms) / duration;
        if t >= 1.0 {
            self.current = tween.to;
            self.tween = None;
        } else {
            let e = ease_power2_out(t);
            self.current = Palette {
                primary: lerp_rgb(tween.from.primary, tween.to.primary, e),
                secondary: lerp_rgb(tween.from.secondary, tween.to.secondary, e),
            };
        }
    }

    pub fn frame_interval_ms(&self, now_ms: f64) -> u64 {
        if now_ms < self.fast_until_ms || self.tween.is_some() {
            self.config.fast_interval_ms
        } else {
            self.config.idle_interval_ms
        }
    }

    /// Throttle gate. Returns true and records the draw when enough time has
    /// passed since the last one.
    pub fn should_draw(&mut self, now_ms: f64) -> bool {
        if !self.is_active() {
            return false;
        }
        let interval = self.frame_interval_ms(now_ms) as f64;
        match self.last_draw_ms {
            Some(last) if now_ms - last < interval => false,
            _ => {
                self.last_draw_ms = Some(now_ms);
                true
            }
        }
    }

    pub fn frame(&mut self, now_ms: f64, width: f64, height: f64) -> GradientFrame {
        self.advance(now_ms);

        let cx = width / 2.0;
        let cy = height / 2.0;
        let min = width.min(height);
        let max = width.max(height);
        let t = now_ms * ORBIT_SPEED;
        let a1 = 0.35 * min;
        let a2 = 0.28 * min;

        GradientFrame {
            base: BASE_COLOR,
            blobs: [
                Blob {
                    x: cx + t.cos() * a1,
                    y: cy + (0.8 * t).sin() * a1 * 0.4,
                    radius: 0.75 * max,
                    color: self.current.primary,
                    alpha: PRIMARY_ALPHA,
                },
                Blob {
                    x: cx + (-0.9 * t + 1.2).cos() * a2,
                    y: cy + (-0.7 * t + 0.7).sin() * a2 * 0.5,
                    radius: 0.65 * max,
                    color: self.current.secondary,
                    alpha: SECONDARY_ALPHA,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn background() -> GradientBackground {
        let mut bg = GradientBackground::new(BackgroundConfig::default());
        bg.start();
        bg
    }

    fn red_blue() -> Palette {
        Palette {
            primary: Rgb::new(200, 40, 40),
            secondary: Rgb::new(40, 40, 200),
        }
    }

    #[test]
    fn test_easing_endpoints() {
        assert_eq!(ease_power2_out(0.0), 0.0);
        assert_eq!(ease_power2_out(1.0), 1.0);
        assert!(ease_power2_out(0.5) > 0.5);
    }

    #[test]
    fn test_tween_reaches_target_after_duration() {
        let mut bg = background();
        bg.retarget(red_blue(), 1000.0);
        bg.frame(1200.0, 800.0, 600.0);
        let mid = bg.palette();
        assert_ne!(mid, red_blue());
        assert_ne!(mid.primary, INITIAL_PRIMARY);

        bg.frame(1450.0, 800.0, 600.0);
        assert_eq!(bg.palette(), red_blue());
    }

    #[test]
    fn test_retarget_mid_tween_starts_from_current() {
        let mut bg = background();
        bg.retarget(red_blue(), 0.0);
        let other = Palette {
            primary: Rgb::new(10, 200, 10),
            secondary: Rgb::new(10, 10, 10),
        };
        bg.retarget(other, 200.0);
        let from = bg.tween.map(|t| t.from).unwrap();
        assert_ne!(from, red_blue());
        assert_ne!(from.primary, INITIAL_PRIMARY);
        assert_eq!(bg.target(), other);
    }

    #[test]
    fn test_throttle_fast_then_idle() {
        let mut bg = background();
        bg.retarget(red_blue(), 0.0);
        assert!(bg.should_draw(0.0));
        assert!(!bg.should_draw(10.0));
        assert!(bg.should_draw(16.0));

        // past the fast window and the tween
        assert!(bg.should_draw(1000.0));
        bg.frame(1000.0, 10.0, 10.0);
        assert!(!bg.should_draw(1020.0));
        assert!(bg.should_draw(1033.0));
    }

    #[test]
    fn test_hidden_or_stopped_never_draws() {
        let mut bg = background();
        bg.set_visible(false);
        assert!(!bg.should_draw(0.0));
        bg.set_visible(true);
        assert!(bg.should_draw(0.0));
        bg.stop();
        assert!(!bg.should_draw(100.0));
    }

    #[test]
    fn test_blob_orbits_stay_near_centre() {
        let mut bg = background();
        for i in 0..100 {
            let f = bg.frame(i as f64 * 997.0, 800.0, 600.0);
            assert!((f.blobs[0].x - 400.0).abs() <= 0.35 * 600.0 + 1e-9);
            assert!((f.blobs[0].y - 300.0).abs() <= 0.35 * 600.0 * 0.4 + 1e-9);
            assert!((f.blobs[1].x - 400.0).abs() <= 0.28 * 600.0 + 1e-9);
            assert_eq!(f.blobs[0].radius, 600.0);
        }
    }

    #[test]
    fn test_sample_blends_toward_blob_colour() {
        let frame = GradientFrame {
            base: BASE_COLOR,
            blobs: [
                Blob {
                    x: 0.0,
                    y: 0.0,
                    radius: 10.0,
                    color: Rgb::new(255, 0, 0),
                    alpha: 1.0,
                },
                Blob {
                    x: 0.0,
                    y: 0.0,
                    radius: 0.0,
                    color: Rgb::new(0, 0, 255),
                    alpha: 1.0,
                },
            ],
        };
        let near = frame.sample(0.5, 0.5);
        let far = frame.sample(39.5, 3.5);
        assert!(near.r > 240 && near.g < 30);
        assert_eq!(far, BASE_COLOR);
    }
}
