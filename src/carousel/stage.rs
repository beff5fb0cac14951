//! The carousel with its supporting cast: image preloading, per-card
//! palettes and the gradient background that follows the active card.

use super::color::{extract_palette, fallback_palette, Palette};
use super::gradient::{GradientBackground, GradientFrame};
use super::images::{ImageLibrary, ImageSource};
use super::{ActiveChange, Carousel, Direction, Layout};
use crate::config::{AuthorCard, BackgroundConfig, CarouselConfig};
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct CarouselStage {
    carousel: Carousel,
    background: GradientBackground,
    images: ImageLibrary,
    authors: Vec<AuthorCard>,
    palettes: Vec<Palette>,
    extracted: Vec<bool>,
    pending: HashSet<usize>,
    preload_radius: usize,
    startup_wait_count: usize,
    startup_wait_timeout: Duration,
    startup_palette_count: usize,
    palette_tx: mpsc::UnboundedSender<(usize, Palette)>,
    palette_rx: mpsc::UnboundedReceiver<(usize, Palette)>,
}

impl CarouselStage {
    pub fn new(
        config: &CarouselConfig,
        background: BackgroundConfig,
        source: Arc<dyn ImageSource>,
    ) -> Self {
        let n = source.len();
        let (palette_tx, palette_rx) = mpsc::unbounded_channel();
        Self {
            carousel: Carousel::new(config.clone(), n),
            background: GradientBackground::new(background),
            images: ImageLibrary::new(source),
            authors: config.authors.clone(),
            palettes: (0..n).map(fallback_palette).collect(),
            extracted: vec![false; n],
            pending: HashSet::new(),
            preload_radius: config.preload_radius,
            startup_wait_count: config.startup_wait_count,
            startup_wait_timeout: Duration::from_millis(config.startup_wait_timeout_ms),
            startup_palette_count: config.startup_palette_count,
            palette_tx,
            palette_rx,
        }
    }

    /// Wait briefly for the first images, analyse the first few, then lay
    /// out the carousel and point the background at the active card.
    pub async fn init(&mut self, layout: Layout, now_ms: f64) {
        let ready = self
            .images
            .preload_startup(self.startup_wait_count, self.startup_wait_timeout)
            .await;

        let count = self.startup_palette_count.min(self.images.len());
        let jobs = (0..count).filter_map(|index| {
            let img = self.images.get(index)?;
            Some(async move {
                let palette =
                    tokio::task::spawn_blocking(move || extract_palette(&img, index)).await;
                (index, palette)
            })
        });
        for (index, result) in join_all(jobs).await {
            match result {
                Ok(palette) => self.apply_palette(index, palette),
                Err(e) => warn!(index, error = %e, "palette extraction failed"),
            }
        }

        info!(
            items = self.images.len(),
            images_ready = ready,
            palettes = self.extracted.iter().filter(|e| **e).count(),
            "carousel stage ready"
        );

        self.background.start();
        if let Some(change) = self.carousel.init(layout) {
            self.on_active_change(change, now_ms);
        }
    }

    pub fn dispose(&mut self) {
        self.carousel.dispose();
        self.background.stop();
        self.pending.clear();
    }

    fn apply_palette(&mut self, index: usize, palette: Palette) {
        if let Some(slot) = self.palettes.get_mut(index) {
            *slot = palette;
            self.extracted[index] = true;
        }
    }

    /// Advance one frame. Returns the active-card change, if any.
    pub fn tick(&mut self, now_ms: f64) -> Option<ActiveChange> {
        self.drain_extractions(now_ms);
        let change = self.carousel.tick(now_ms)?;
        self.on_active_change(change, now_ms);
        Some(change)
    }

    fn on_active_change(&mut self, change: ActiveChange, now_ms: f64) {
        debug!(index = change.index, previous = ?change.previous, "active card changed");
        self.request_palette(change.index);
        if let Some(palette) = self.palettes.get(change.index) {
            self.background.retarget(*palette, now_ms);
        }
        self.images.preload_around(change.index, self.preload_radius);
    }

    /// Schedule palette extraction for one card unless it already has one.
    fn request_palette(&mut self, index: usize) {
        if index >= self.extracted.len() || self.extracted[index] || !self.pending.insert(index) {
            return;
        }
        let images = self.images.clone();
        let tx = self.palette_tx.clone();
        tokio::spawn(async move {
            let img = match images.load(index).await {
                Ok(img) => img,
                Err(_) => return,
            };
            match tokio::task::spawn_blocking(move || extract_palette(&img, index)).await {
                Ok(palette) => {
                    let _ = tx.send((index, palette));
                }
                Err(e) => warn!(index, error = %e, "palette extraction failed"),
            }
        });
    }

    /// Apply palettes finished by background workers.
    pub fn drain_extractions(&mut self, now_ms: f64) -> usize {
        let mut applied = 0;
        while let Ok((index, palette)) = self.palette_rx.try_recv() {
            self.pending.remove(&index);
            self.apply_palette(index, palette);
            applied += 1;
            if self.carousel.active_index() == Some(index) {
                self.background.retarget(palette, now_ms);
            }
        }
        applied
    }

    /// Pause or resume both frame loops.
    pub fn set_visible(&mut self, visible: bool) {
        if visible {
            self.carousel.start();
        } else {
            self.carousel.stop();
        }
        self.background.set_visible(visible);
    }

    /// Gradient for this instant, or `None` when the draw is throttled.
    pub fn background_frame(&mut self, now_ms: f64, width: f64, height: f64) -> Option<GradientFrame> {
        if !self.background.should_draw(now_ms) {
            return None;
        }
        Some(self.background.frame(now_ms, width, height))
    }

    pub fn navigate(&mut self, direction: Direction) -> bool {
        self.carousel.navigate(direction)
    }

    /// End a press; a click on a card returns its author.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Option<&AuthorCard> {
        let index = self.carousel.pointer_up(x, y)?;
        self.authors.get(index)
    }

    pub fn carousel(&self) -> &Carousel {
        &self.carousel
    }

    pub fn carousel_mut(&mut self) -> &mut Carousel {
        &mut self.carousel
    }

    pub fn background(&self) -> &GradientBackground {
        &self.background
    }

    pub fn palette(&self, index: usize) -> Option<Palette> {
        self.palettes.get(index).copied()
    }

    pub fn has_extracted_palette(&self, index: usize) -> bool {
        self.extracted.get(index).copied().unwrap_or(false)
    }

    pub fn author(&self, index: usize) -> Option<&AuthorCard> {
        self.authors.get(index)
    }

    pub fn image_ready(&self, index: usize) -> bool {
        self.images.is_ready(index)
    }

    pub fn image_broken(&self, index: usize) -> bool {
        self.images.is_broken(index)
    }
}
