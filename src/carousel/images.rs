//! Card image loading.
//!
//! Bytes come from an [`ImageSource`]; decoding runs on the blocking pool.
//! Each item has a slot that records whether its image is ready or broken, so
//! the carousel can keep a fallback palette for items that never load.

use crate::config::AuthorCard;
use async_trait::async_trait;
use futures_util::future::join_all;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("no image configured for item {0}")]
    Missing(usize),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image for item {index}: {message}")]
    ImageDecode { index: usize, message: String },
    #[error("timed out loading image for item {0}")]
    Timeout(usize),
    #[error("image for item {0} failed to load earlier")]
    Unavailable(usize),
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load(&self, index: usize) -> Result<Vec<u8>, ImageError>;
}

/// Reads card images from disk.
pub struct FsImageSource {
    paths: Vec<PathBuf>,
}

impl FsImageSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn from_authors(authors: &[AuthorCard]) -> Self {
        Self::new(authors.iter().map(|a| a.image.clone()).collect())
    }
}

#[async_trait]
impl ImageSource for FsImageSource {
    fn len(&self) -> usize {
        self.paths.len()
    }

    async fn load(&self, index: usize) -> Result<Vec<u8>, ImageError> {
        let path = self.paths.get(index).ok_or(ImageError::Missing(index))?;
        tokio::fs::read(path).await.map_err(|source| ImageError::Io {
            path: path.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Empty,
    /// A task is fetching; waiters are woken through the `Notify`.
    Loading(Arc<Notify>),
    Ready(Arc<DynamicImage>),
    Broken,
}

enum Claim {
    Ready(Arc<DynamicImage>),
    Broken,
    Owner(Arc<Notify>),
    Wait(Arc<Notify>),
}

/// Wakes waiters when the owning load ends. A load dropped before it
/// finished puts its slot back to `Empty` so the next caller fetches.
struct PendingLoad<'a> {
    lib: &'a ImageLibrary,
    index: usize,
    done: Arc<Notify>,
    finished: bool,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.lib.set_slot(self.index, Slot::Empty);
        }
        self.done.notify_waiters();
    }
}

/// Shared, clonable handle over the per-item image slots.
#[derive(Clone)]
pub struct ImageLibrary {
    source: Arc<dyn ImageSource>,
    slots: Arc<Mutex<Vec<Slot>>>,
}

impl ImageLibrary {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        let slots = vec![Slot::Empty; source.len()];
        Self {
            source,
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut Vec<Slot>) -> R) -> R {
        let mut guard = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn set_slot(&self, index: usize, slot: Slot) {
        self.with_slots(|slots| {
            if let Some(s) = slots.get_mut(index) {
                *s = slot;
            }
        });
    }

    fn claim(&self, index: usize) -> Option<Claim> {
        self.with_slots(|slots| {
            let slot = slots.get_mut(index)?;
            Some(match slot {
                Slot::Ready(img) => Claim::Ready(img.clone()),
                Slot::Broken => Claim::Broken,
                Slot::Loading(done) => Claim::Wait(done.clone()),
                Slot::Empty => {
                    let done = Arc::new(Notify::new());
                    *slot = Slot::Loading(done.clone());
                    Claim::Owner(done)
                }
            })
        })
    }

    /// True while the load that owns `done` is still in flight.
    fn still_loading(&self, index: usize, done: &Arc<Notify>) -> bool {
        self.with_slots(|slots| {
            matches!(slots.get(index), Some(Slot::Loading(current)) if Arc::ptr_eq(current, done))
        })
    }

    pub fn get(&self, index: usize) -> Option<Arc<DynamicImage>> {
        self.with_slots(|slots| match slots.get(index) {
            Some(Slot::Ready(img)) => Some(img.clone()),
            _ => None,
        })
    }

    pub fn is_ready(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn is_broken(&self, index: usize) -> bool {
        self.with_slots(|slots| matches!(slots.get(index), Some(Slot::Broken)))
    }

    /// Fetch and decode one image, caching the result in its slot. A load
    /// already in flight is awaited rather than fetched again.
    pub async fn load(&self, index: usize) -> Result<Arc<DynamicImage>, ImageError> {
        loop {
            match self.claim(index) {
                None => return Err(ImageError::Missing(index)),
                Some(Claim::Ready(img)) => return Ok(img),
                Some(Claim::Broken) => return Err(ImageError::Unavailable(index)),
                Some(Claim::Owner(done)) => return self.fill(index, done).await,
                Some(Claim::Wait(done)) => {
                    // register before re-checking so a wake-up in between is not lost
                    let notified = done.notified();
                    if self.still_loading(index, &done) {
                        notified.await;
                    }
                }
            }
        }
    }

    async fn fill(&self, index: usize, done: Arc<Notify>) -> Result<Arc<DynamicImage>, ImageError> {
        let mut pending = PendingLoad {
            lib: self,
            index,
            done,
            finished: false,
        };
        let result = match self.fetch(index).await {
            Ok(img) => {
                let img = Arc::new(img);
                self.set_slot(index, Slot::Ready(img.clone()));
                debug!(index, "card image loaded");
                Ok(img)
            }
            Err(e) => {
                self.set_slot(index, Slot::Broken);
                warn!(index, error = %e, "card image unavailable");
                Err(e)
            }
        };
        pending.finished = true;
        result
    }

    async fn fetch(&self, index: usize) -> Result<DynamicImage, ImageError> {
        let bytes = self.source.load(index).await?;
        tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| ImageError::ImageDecode {
                index,
                message: e.to_string(),
            })?
            .map_err(|e| ImageError::ImageDecode {
                index,
                message: e.to_string(),
            })
    }

    /// Start loading the first `count` images and wait for each at most
    /// `timeout`. Loads that time out keep running in the background.
    /// Returns how many images were ready when the wait ended.
    pub async fn preload_startup(&self, count: usize, timeout: Duration) -> usize {
        let count = count.min(self.len());
        let waits = (0..count).map(|index| {
            let lib = self.clone();
            let handle = tokio::spawn(async move { lib.load(index).await });
            async move {
                match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(Ok(_))) => true,
                    Ok(Ok(Err(_))) => false,
                    Ok(Err(e)) => {
                        warn!(index, error = %e, "image load task failed");
                        false
                    }
                    Err(_) => {
                        debug!(index, error = %ImageError::Timeout(index), "startup wait elapsed");
                        false
                    }
                }
            }
        });
        join_all(waits).await.into_iter().filter(|ok| *ok).count()
    }

    /// Fire-and-forget loads for every item within `radius` of `center` on
    /// the ring. Items already loading, loaded or broken are skipped.
    pub fn preload_around(&self, center: usize, radius: usize) -> Vec<usize> {
        let n = self.len();
        if n == 0 {
            return Vec::new();
        }
        let mut started = Vec::new();
        let span = radius.min(n / 2);
        for d in 0..=span {
            for index in [(center + d) % n, (center + n - d % n) % n] {
                if let Some(Claim::Owner(done)) = self.claim(index) {
                    started.push(index);
                    let lib = self.clone();
                    tokio::spawn(async move {
                        let _ = lib.fill(index, done).await;
                    });
                }
            }
        }
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn png_bytes(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([r, g, b]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    struct MemorySource {
        images: Vec<Option<Vec<u8>>>,
        delay: Duration,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ImageSource for MemorySource {
        fn len(&self) -> usize {
            self.images.len()
        }

        async fn load(&self, index: usize) -> Result<Vec<u8>, ImageError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.images.get(index) {
                Some(Some(bytes)) => Ok(bytes.clone()),
                Some(None) => Ok(b"not an image".to_vec()),
                None => Err(ImageError::Missing(index)),
            }
        }
    }

    fn source(images: Vec<Option<Vec<u8>>>, delay: Duration) -> Arc<MemorySource> {
        Arc::new(MemorySource {
            images,
            delay,
            fetches: AtomicUsize::new(0),
        })
    }

    fn library(images: Vec<Option<Vec<u8>>>, delay: Duration) -> ImageLibrary {
        ImageLibrary::new(source(images, delay))
    }

    #[tokio::test]
    async fn test_load_decodes_and_caches() {
        let lib = library(vec![Some(png_bytes(200, 10, 10))], Duration::ZERO);
        let img = lib.load(0).await.unwrap();
        assert_eq!(img.width(), 8);
        assert!(lib.is_ready(0));
        assert!(Arc::ptr_eq(&img, &lib.load(0).await.unwrap()));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_marked_broken() {
        let lib = library(vec![None], Duration::ZERO);
        let err = lib.load(0).await.unwrap_err();
        assert!(matches!(err, ImageError::ImageDecode { index: 0, .. }));
        assert!(lib.is_broken(0));
        assert!(lib.get(0).is_none());
    }

    #[tokio::test]
    async fn test_startup_wait_gives_up_after_timeout() {
        let lib = library(
            vec![Some(png_bytes(1, 2, 3)), Some(png_bytes(4, 5, 6))],
            Duration::from_millis(400),
        );
        let ready = lib.preload_startup(7, Duration::from_millis(20)).await;
        assert_eq!(ready, 0);

        // loads keep going after the wait ends
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(lib.is_ready(0));
        assert!(lib.is_ready(1));
    }

    #[tokio::test]
    async fn test_load_after_startup_timeout_joins_inflight_fetch() {
        let src = source(vec![Some(png_bytes(7, 8, 9))], Duration::from_millis(200));
        let lib = ImageLibrary::new(src.clone());
        assert_eq!(lib.preload_startup(1, Duration::from_millis(20)).await, 0);

        let (a, b) = tokio::join!(lib.load(0), lib.load(0));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(src.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broken_image_is_not_fetched_again() {
        let src = source(vec![None], Duration::ZERO);
        let lib = ImageLibrary::new(src.clone());
        assert!(lib.load(0).await.is_err());
        assert!(matches!(lib.load(0).await, Err(ImageError::Unavailable(0))));
        assert_eq!(src.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_startup_counts_ready_images() {
        let lib = library(
            vec![Some(png_bytes(1, 2, 3)), None, Some(png_bytes(4, 5, 6))],
            Duration::ZERO,
        );
        let ready = lib.preload_startup(7, Duration::from_secs(5)).await;
        assert_eq!(ready, 2);
        assert!(lib.is_broken(1));
    }

    #[tokio::test]
    async fn test_preload_around_wraps_and_skips_claimed() {
        let images = (0..10).map(|i| Some(png_bytes(i, i, i))).collect();
        let lib = library(images, Duration::ZERO);
        let mut started = lib.preload_around(0, 2);
        started.sort();
        assert_eq!(started, vec![0, 1, 2, 8, 9]);

        let again = lib.preload_around(1, 1);
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_fs_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, png_bytes(9, 9, 9)).unwrap();
        let source = FsImageSource::new(vec![path, dir.path().join("absent.png")]);

        assert!(!source.load(0).await.unwrap().is_empty());
        assert!(matches!(source.load(1).await, Err(ImageError::Io { .. })));
        assert!(matches!(source.load(2).await, Err(ImageError::Missing(2))));
    }
}
