//! Dominant colour extraction from card images.
//!
//! Pixels are bucketed by (hue, saturation) and weighted toward saturated
//! mid-tones; the heaviest bucket gives the primary colour and the heaviest
//! bucket at a clearly different hue gives the secondary.

use image::imageops::FilterType;
use image::DynamicImage;

const SAMPLE_MAX: u32 = 48;
const SAMPLE_MIN: u32 = 16;
const HUE_BINS: usize = 36;
const SAT_BINS: usize = 5;
const BIN_COUNT: usize = HUE_BINS * SAT_BINS;
const HUE_STEP: f64 = 360.0 / HUE_BINS as f64;

/// Minimum circular hue distance (degrees) between primary and secondary.
const MIN_HUE_SEPARATION: f64 = 25.0;
/// Secondary bucket must weigh at least this fraction of the primary's.
const MIN_SECONDARY_SHARE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Two-colour palette driving the background gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: Rgb,
    pub secondary: Rgb,
}

/// Returns (hue 0-360, saturation 0-1, lightness 0-1).
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h / 6.0 * 360.0, s, l)
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    let h = h.rem_euclid(360.0) / 360.0;

    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    };

    Rgb::new(to_byte(r), to_byte(g), to_byte(b))
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn to_byte(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Deterministic palette for an item whose image has not been analysed.
pub fn fallback_palette(index: usize) -> Palette {
    let hue = ((index * 37) % 360) as f64;
    Palette {
        primary: hsl_to_rgb(hue, 0.65, 0.52),
        secondary: hsl_to_rgb(hue, 0.65, 0.72),
    }
}

/// Circular distance between two hues in degrees.
pub fn hue_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}

/// Weighted (hue × saturation) histogram.
pub struct Histogram {
    weight: [f64; BIN_COUNT],
    r: [f64; BIN_COUNT],
    g: [f64; BIN_COUNT],
    b: [f64; BIN_COUNT],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            weight: [0.0; BIN_COUNT],
            r: [0.0; BIN_COUNT],
            g: [0.0; BIN_COUNT],
            b: [0.0; BIN_COUNT],
        }
    }

    /// Accumulate one RGBA pixel. Transparent, near-white, near-black and
    /// washed-out pixels are ignored.
    pub fn add(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let alpha = a as f64 / 255.0;
        if alpha < 0.05 {
            return;
        }
        let (h, s, l) = rgb_to_hsl(r, g, b);
        if !(0.1..=0.92).contains(&l) || s < 0.08 {
            return;
        }

        let w = alpha * s * s * (1.0 - (l - 0.5).abs() * 0.6);
        let hi = ((h / 360.0 * HUE_BINS as f64).floor() as usize).min(HUE_BINS - 1);
        let si = ((s * SAT_BINS as f64).floor() as usize).min(SAT_BINS - 1);
        let bin = hi * SAT_BINS + si;

        self.weight[bin] += w;
        self.r[bin] += r as f64 * w;
        self.g[bin] += g as f64 * w;
        self.b[bin] += b as f64 * w;
    }

    fn bin_hue(bin: usize) -> f64 {
        (bin / SAT_BINS) as f64 * HUE_STEP
    }

    fn average(&self, bin: usize) -> Rgb {
        let w = if self.weight[bin] > 0.0 { self.weight[bin] } else { 1e-6 };
        Rgb::new(
            (self.r[bin] / w).round() as u8,
            (self.g[bin] / w).round() as u8,
            (self.b[bin] / w).round() as u8,
        )
    }

    /// Heaviest bucket, or `None` if nothing qualified.
    pub fn primary_bin(&self) -> Option<usize> {
        let mut best = None;
        let mut best_w = 0.0;
        for (i, &w) in self.weight.iter().enumerate() {
            if w > best_w {
                best_w = w;
                best = Some(i);
            }
        }
        best
    }

    /// Heaviest bucket far enough in hue from `primary`, if it also carries
    /// enough weight to read as a second colour.
    pub fn secondary_bin(&self, primary: usize) -> Option<usize> {
        let p_hue = Self::bin_hue(primary);
        let p_w = self.weight[primary];

        let mut best = None;
        let mut best_w = 0.0;
        for (i, &w) in self.weight.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            if hue_distance(Self::bin_hue(i), p_hue) >= MIN_HUE_SEPARATION && w > best_w {
                best_w = w;
                best = Some(i);
            }
        }

        best.filter(|_| best_w >= p_w * MIN_SECONDARY_SHARE)
    }

    /// Palette from the histogram, or `None` when no pixel qualified.
    pub fn palette(&self) -> Option<Palette> {
        let p_bin = self.primary_bin()?;

        let p = self.average(p_bin);
        let (h1, s1, _) = rgb_to_hsl(p.r, p.g, p.b);
        let s1 = (s1 * 1.15).clamp(0.45, 1.0);
        let primary = hsl_to_rgb(h1, s1, 0.5);

        let secondary = match self.secondary_bin(p_bin) {
            Some(s_bin) => {
                let c = self.average(s_bin);
                let (h2, s2, _) = rgb_to_hsl(c.r, c.g, c.b);
                hsl_to_rgb(h2, (s2 * 1.05).clamp(0.45, 1.0), 0.72)
            }
            None => hsl_to_rgb(h1, s1, 0.72),
        };

        Some(Palette { primary, secondary })
    }
}

/// Size of the analysis thumbnail: long edge 48 px, short edge at least 16.
fn sample_size(width: u32, height: u32) -> (u32, u32) {
    let ratio = if width > 0 && height > 0 {
        width as f64 / height as f64
    } else {
        1.0
    };
    if ratio >= 1.0 {
        let th = ((SAMPLE_MAX as f64 / ratio).round() as u32).max(SAMPLE_MIN);
        (SAMPLE_MAX, th)
    } else {
        let tw = ((SAMPLE_MAX as f64 * ratio).round() as u32).max(SAMPLE_MIN);
        (tw, SAMPLE_MAX)
    }
}

/// Extract the two dominant colours of `img`, falling back to the
/// index-keyed hue rotation when the image yields nothing usable.
pub fn extract_palette(img: &DynamicImage, index: usize) -> Palette {
    if img.width() == 0 || img.height() == 0 {
        return fallback_palette(index);
    }
    let (tw, th) = sample_size(img.width(), img.height());
    let sample = img.resize_exact(tw, th, FilterType::Triangle).to_rgba8();

    let mut hist = Histogram::new();
    for px in sample.pixels() {
        let [r, g, b, a] = px.0;
        hist.add(r, g, b, a);
    }

    hist.palette().unwrap_or_else(|| fallback_palette(index))
}
