//! Inertial 3D carousel over a looping ring of cards.
//!
//! [`Carousel`] owns the scroll physics and per-frame card transforms.
//! [`stage::CarouselStage`] wires it to image loading, colour extraction and
//! the gradient background.

pub mod color;
pub mod gradient;
pub mod images;
pub mod physics;
pub mod stage;
pub mod transform;

use crate::config::CarouselConfig;
use physics::{Motion, Release};
use transform::{layout_frame, CardTransform, Projection};
use tracing::debug;

/// Re-measure only when a dimension moves by at least this much.
const RESIZE_EPSILON_PX: f64 = 0.5;
/// Cards within this fraction of the viewport width take part in the entry animation.
const ENTRY_SPAN: f64 = 0.6;
/// Longest frame step fed to the physics, so a stalled frame does not jump.
const MAX_DT_S: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Measured card and viewport sizes, px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub card_width: f64,
    pub card_height: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl Layout {
    fn differs_from(&self, other: &Layout) -> bool {
        (self.card_width - other.card_width).abs() >= RESIZE_EPSILON_PX
            || (self.card_height - other.card_height).abs() >= RESIZE_EPSILON_PX
            || (self.viewport_width - other.viewport_width).abs() >= RESIZE_EPSILON_PX
            || (self.viewport_height - other.viewport_height).abs() >= RESIZE_EPSILON_PX
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarouselItem {
    pub index: usize,
    /// Position of the card along the unwrapped track, px.
    pub base_offset: f64,
}

/// Emitted when the card nearest the centre changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveChange {
    pub previous: Option<usize>,
    pub index: usize,
}

#[derive(Debug)]
pub struct Carousel {
    config: CarouselConfig,
    projection: Projection,
    item_count: usize,
    layout: Option<Layout>,
    items: Vec<CarouselItem>,
    step: f64,
    track: f64,
    motion: Motion,
    transforms: Vec<CardTransform>,
    active: Option<usize>,
    entering: bool,
    running: bool,
    last_tick_ms: Option<f64>,
}

impl Carousel {
    pub fn new(config: CarouselConfig, item_count: usize) -> Self {
        Self {
            projection: Projection::from(&config),
            motion: Motion::new(&config),
            config,
            item_count,
            layout: None,
            items: Vec::new(),
            step: 0.0,
            track: 0.0,
            transforms: Vec::new(),
            active: None,
            entering: false,
            running: false,
            last_tick_ms: None,
        }
    }

    /// Measure, lay out the first frame and enter the entry phase. Input is
    /// ignored until [`Carousel::finish_entry`].
    pub fn init(&mut self, layout: Layout) -> Option<ActiveChange> {
        self.measure(layout);
        self.entering = true;
        self.running = true;
        self.last_tick_ms = None;
        debug!(
            items = self.item_count,
            step = self.step,
            track = self.track,
            "carousel initialised"
        );
        self.relayout()
    }

    pub fn dispose(&mut self) {
        self.running = false;
        self.entering = false;
        self.motion.cancel_drag();
        self.motion.stop();
        self.layout = None;
        self.items.clear();
        self.transforms.clear();
        self.active = None;
        self.last_tick_ms = None;
    }

    pub fn is_initialised(&self) -> bool {
        self.layout.is_some()
    }

    pub fn finish_entry(&mut self) {
        self.entering = false;
    }

    pub fn is_entering(&self) -> bool {
        self.entering
    }

    fn measure(&mut self, layout: Layout) {
        self.step = layout.card_width + self.config.gap;
        self.track = self.step * self.item_count as f64;
        self.items = (0..self.item_count)
            .map(|index| CarouselItem {
                index,
                base_offset: index as f64 * self.step,
            })
            .collect();
        self.layout = Some(layout);
    }

    /// Re-measure after a viewport change, keeping the relative scroll
    /// position. Returns false when the change is below the threshold.
    pub fn resize(&mut self, layout: Layout) -> bool {
        let Some(old) = self.layout else {
            return false;
        };
        if !layout.differs_from(&old) {
            return false;
        }
        let old_track = self.track;
        self.measure(layout);
        self.motion.rescale(old_track, self.track);
        self.relayout();
        true
    }

    /// Cards that take part in the entry animation, left to right.
    pub fn entry_cards(&self) -> Vec<usize> {
        let Some(layout) = self.layout else {
            return Vec::new();
        };
        let limit = ENTRY_SPAN * layout.viewport_width;
        let mut cards: Vec<(usize, f64)> = self
            .transforms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.screen_x.abs() < limit)
            .map(|(i, t)| (i, t.screen_x))
            .collect();
        cards.sort_by(|a, b| a.1.total_cmp(&b.1));
        cards.into_iter().map(|(i, _)| i).collect()
    }

    pub fn start(&mut self) {
        self.running = true;
        self.last_tick_ms = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.motion.cancel_drag();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance physics to `now_ms` and recompute transforms.
    pub fn tick(&mut self, now_ms: f64) -> Option<ActiveChange> {
        if !self.running || self.layout.is_none() {
            return None;
        }
        let dt = match self.last_tick_ms {
            Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, MAX_DT_S),
            None => 0.0,
        };
        self.last_tick_ms = Some(now_ms);
        self.motion.step(dt, self.track);
        self.relayout()
    }

    fn relayout(&mut self) -> Option<ActiveChange> {
        let layout = self.layout?;
        let offsets: Vec<f64> = self.items.iter().map(|i| i.base_offset).collect();
        let (transforms, active) = layout_frame(
            &offsets,
            self.motion.scroll(),
            self.track,
            layout.viewport_width / 2.0,
            &self.projection,
        );
        self.transforms = transforms;

        let index = active?;
        if self.active == Some(index) {
            return None;
        }
        let change = ActiveChange {
            previous: self.active,
            index,
        };
        self.active = Some(index);
        Some(change)
    }

    fn accepts_input(&self) -> bool {
        self.layout.is_some() && !self.entering && self.item_count > 0
    }

    pub fn wheel(&mut self, delta_x: f64, delta_y: f64) {
        if self.accepts_input() {
            self.motion.wheel(delta_x, delta_y);
        }
    }

    /// Kick the track by one card in the given direction.
    pub fn navigate(&mut self, direction: Direction) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let distance = match direction {
            Direction::Next => self.step,
            Direction::Prev => -self.step,
        };
        self.motion.nudge(distance);
        true
    }

    pub fn pointer_down(&mut self, x: f64, t_ms: f64) {
        if self.accepts_input() {
            self.motion.pointer_down(x, t_ms);
        }
    }

    pub fn pointer_move(&mut self, x: f64, t_ms: f64) {
        self.motion.pointer_move(x, t_ms, self.track);
    }

    /// End a press. A press that barely moved resolves to the card under the
    /// pointer, if any.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Option<usize> {
        match self.motion.pointer_up(x)? {
            Release::Click { x } => self.card_at(x, y),
            Release::Fling { .. } => None,
        }
    }

    /// Topmost visible card containing the viewport point `(x, y)`.
    pub fn card_at(&self, x: f64, y: f64) -> Option<usize> {
        let layout = self.layout?;
        let cx = layout.viewport_width / 2.0;
        let cy = layout.viewport_height / 2.0;
        self.transforms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.visible)
            .filter(|(_, t)| {
                let half_w =
                    layout.card_width / 2.0 * t.scale * t.rotate_y_deg.to_radians().cos();
                let half_h = layout.card_height / 2.0 * t.scale;
                (x - (cx + t.screen_x)).abs() <= half_w && (y - cy).abs() <= half_h
            })
            .max_by_key(|(_, t)| t.z_index)
            .map(|(i, _)| i)
    }

    pub fn transforms(&self) -> &[CardTransform] {
        &self.transforms
    }

    pub fn items(&self) -> &[CarouselItem] {
        &self.items
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn is_at_rest(&self) -> bool {
        self.motion.is_at_rest()
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn track(&self) -> f64 {
        self.track
    }

    pub fn scroll(&self) -> f64 {
        self.motion.scroll()
    }

    pub fn len(&self) -> usize {
        self.item_count
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}
