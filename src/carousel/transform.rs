use crate::config::CarouselConfig;

/// Visual constants for projecting a card from its screen offset.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub max_rotation_deg: f64,
    pub max_depth: f64,
    pub min_scale: f64,
    pub scale_range: f64,
    pub max_blur: f64,
    pub blur_exponent: f64,
    pub cull_factor: f64,
}

impl From<&CarouselConfig> for Projection {
    fn from(c: &CarouselConfig) -> Self {
        Self {
            max_rotation_deg: c.max_rotation_deg,
            max_depth: c.max_depth,
            min_scale: c.min_scale,
            scale_range: c.scale_range,
            max_blur: c.max_blur,
            blur_exponent: c.blur_exponent,
            cull_factor: c.cull_factor,
        }
    }
}

/// Per-card 3D transform for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTransform {
    /// Horizontal offset of the card centre from the viewport centre, px.
    pub screen_x: f64,
    /// `screen_x` normalised by half the viewport width, clamped to [-1, 1].
    pub norm: f64,
    pub rotate_y_deg: f64,
    pub translate_z: f64,
    pub scale: f64,
    pub blur: f64,
    pub z_index: i32,
    pub visible: bool,
}

/// Offset of an item relative to the scroll position, taking the copy of
/// the looping track that lies within half a track of the centre.
pub fn wrapped_position(base_offset: f64, scroll: f64, track: f64) -> f64 {
    let half = track / 2.0;
    let mut pos = base_offset - scroll;
    if pos < -half {
        pos += track;
    }
    if pos > half {
        pos -= track;
    }
    pos
}

pub fn normalize(screen_x: f64, half_viewport: f64) -> f64 {
    if half_viewport <= 0.0 {
        return 0.0;
    }
    (screen_x / half_viewport).clamp(-1.0, 1.0)
}

/// Blur for a non-core card; grows with a mild power of its distance from centre.
pub fn blur_for(norm: f64, is_core: bool, p: &Projection) -> f64 {
    if is_core {
        0.0
    } else {
        p.max_blur * norm.abs().powf(p.blur_exponent)
    }
}

pub fn project(screen_x: f64, half_viewport: f64, p: &Projection) -> CardTransform {
    let norm = normalize(screen_x, half_viewport);
    let inv = 1.0 - norm.abs();
    let translate_z = inv * p.max_depth;
    CardTransform {
        screen_x,
        norm,
        rotate_y_deg: -norm * p.max_rotation_deg,
        translate_z,
        scale: p.min_scale + inv * p.scale_range,
        blur: 0.0,
        z_index: 1000 + translate_z.round() as i32,
        visible: screen_x.abs() <= half_viewport * p.cull_factor,
    }
}

/// Transforms for every item plus the index of the item nearest the centre.
pub fn layout_frame(
    base_offsets: &[f64],
    scroll: f64,
    track: f64,
    half_viewport: f64,
    p: &Projection,
) -> (Vec<CardTransform>, Option<usize>) {
    let n = base_offsets.len();
    if n == 0 {
        return (Vec::new(), None);
    }

    let positions: Vec<f64> = base_offsets
        .iter()
        .map(|&base| wrapped_position(base, scroll, track))
        .collect();

    let mut active = 0;
    let mut best = f64::INFINITY;
    for (i, pos) in positions.iter().enumerate() {
        if pos.abs() < best {
            best = pos.abs();
            active = i;
        }
    }
    let prev = (active + n - 1) % n;
    let next = (active + 1) % n;

    let transforms = positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let mut t = project(pos, half_viewport, p);
            let is_core = i == active || i == prev || i == next;
            t.blur = blur_for(t.norm, is_core, p);
            t
        })
        .collect();

    (transforms, Some(active))
}
