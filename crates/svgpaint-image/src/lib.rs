//! # svgpaint Image
//!
//! Raster image loading, decoding, and caching for svgpaint.
//!
//! This crate handles:
//! - Async image fetching through `svgpaint-net` (http, files, data URLs)
//! - Decoding of PNG, JPEG, GIF, WebP, BMP, and ICO formats
//! - Deduplication of concurrent loads of the same href
//! - An LRU memory cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use image::RgbaImage;
use svgpaint_canvas::ImageBitmap;
use svgpaint_net::{FetchConfig, Fetcher, NetError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

pub mod cache;
pub mod decode;

pub use cache::{CacheStats, ImageCache};
pub use decode::{decode_rgba, detect_format, format_to_mime, mime_to_format};

/// Errors that can occur during image operations
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to fetch image: {0}")]
    Fetch(#[from] NetError),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large: {width}x{height} exceeds maximum")]
    TooLarge { width: u32, height: u32 },

    /// A shared load that another caller started failed.
    #[error("Image load failed: {0}")]
    Shared(String),
}

/// Result type for image operations
pub type ImageResult<T> = Result<T, ImageError>;

/// A loaded and decoded image
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The href the image was requested with
    pub href: String,
    pub natural_width: u32,
    pub natural_height: u32,
    pub pixels: RgbaImage,
    /// Drawing-surface handle for this raster
    pub bitmap: ImageBitmap,
    pub content_type: Option<String>,
    pub decoded_at: Instant,
}

impl LoadedImage {
    pub fn new(href: String, pixels: RgbaImage, content_type: Option<String>) -> Self {
        let (natural_width, natural_height) = pixels.dimensions();
        Self {
            href,
            natural_width,
            natural_height,
            pixels,
            bitmap: ImageBitmap::new(natural_width, natural_height),
            content_type,
            decoded_at: Instant::now(),
        }
    }

    /// Get the aspect ratio
    pub fn aspect_ratio(&self) -> f64 {
        if self.natural_height == 0 {
            1.0
        } else {
            self.natural_width as f64 / self.natural_height as f64
        }
    }
}

/// Image manager configuration
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Number of decoded images kept in memory
    pub cache_capacity: usize,
    /// Maximum decoded width and height
    pub max_dimensions: (u32, u32),
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            max_dimensions: (16384, 16384),
        }
    }
}

type Waiters = Vec<oneshot::Sender<ImageResult<Arc<LoadedImage>>>>;

/// Loads, decodes and caches raster images.
pub struct ImageManager {
    fetcher: Fetcher,
    cache: Arc<Mutex<ImageCache>>,
    pending: Arc<Mutex<HashMap<String, Waiters>>>,
    config: ImageConfig,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ImageManager {
    /// Create a new image manager
    pub fn new(fetch: FetchConfig, config: ImageConfig) -> ImageResult<Self> {
        Ok(Self::with_fetcher(Fetcher::new(fetch)?, config))
    }

    /// Create an image manager around an existing fetcher
    pub fn with_fetcher(fetcher: Fetcher, config: ImageConfig) -> Self {
        Self {
            fetcher,
            cache: Arc::new(Mutex::new(ImageCache::new(config.cache_capacity))),
            pending: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Load an image by href
    pub async fn load(&self, href: &str) -> ImageResult<Arc<LoadedImage>> {
        if let Some(cached) = lock(&self.cache).get(href) {
            debug!(href, "Image cache hit");
            return Ok(cached);
        }

        // Join a load already in flight
        let waiter = {
            let mut pending = lock(&self.pending);
            match pending.get_mut(href) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    pending.insert(href.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            debug!(href, "Image already loading");
            return rx
                .await
                .map_err(|_| ImageError::Shared("load cancelled".into()))?;
        }

        debug!(href, "Starting image load");
        let result = self.fetch_and_decode(href).await;

        let waiters = lock(&self.pending).remove(href).unwrap_or_default();

        match &result {
            Ok(image) => {
                lock(&self.cache).insert(href.to_string(), image.clone());
                for waiter in waiters {
                    let _ = waiter.send(Ok(image.clone()));
                }
            }
            Err(e) => {
                let message = e.to_string();
                for waiter in waiters {
                    let _ = waiter.send(Err(ImageError::Shared(message.clone())));
                }
            }
        }

        result
    }

    async fn fetch_and_decode(&self, href: &str) -> ImageResult<Arc<LoadedImage>> {
        let response = self.fetcher.fetch(href).await?;
        let content_type = response.content_type.as_ref().map(|m| m.essence_str().to_string());
        let pixels = decode_rgba(
            &response.bytes(),
            content_type.as_deref(),
            self.config.max_dimensions,
        )?;
        debug!(
            href,
            width = pixels.width(),
            height = pixels.height(),
            "Image decoded"
        );
        Ok(Arc::new(LoadedImage::new(
            href.to_string(),
            pixels,
            content_type,
        )))
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        lock(&self.cache).stats()
    }

    pub fn is_cached(&self, href: &str) -> bool {
        lock(&self.cache).contains(href)
    }
}
