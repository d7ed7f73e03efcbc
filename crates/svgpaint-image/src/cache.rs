//! Image caching module
//!
//! LRU memory cache for decoded images keyed by href.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::LoadedImage;

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Current number of cached images
    pub count: usize,
    /// Estimated memory usage in bytes
    pub memory_bytes: usize,
}

impl CacheStats {
    /// Get the hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Memory cache for decoded images
pub struct ImageCache {
    cache: LruCache<String, Arc<LoadedImage>>,
    stats: CacheStats,
}

impl ImageCache {
    /// Create a new cache with the given capacity (at least one entry).
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: CacheStats::default(),
        }
    }

    /// Look up an image, updating recency and hit/miss counters.
    pub fn get(&mut self, href: &str) -> Option<Arc<LoadedImage>> {
        let found = self.cache.get(href).cloned();
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        found
    }

    pub fn insert(&mut self, href: String, image: Arc<LoadedImage>) {
        self.cache.put(href, image);
        self.refresh_usage();
    }

    pub fn contains(&self, href: &str) -> bool {
        self.cache.contains(href)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.refresh_usage();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn refresh_usage(&mut self) {
        self.stats.count = self.cache.len();
        self.stats.memory_bytes = self
            .cache
            .iter()
            .map(|(_, image)| Self::estimate_memory(image))
            .sum();
    }

    /// Estimate memory usage of a cached image
    pub fn estimate_memory(image: &LoadedImage) -> usize {
        (image.natural_width as usize) * (image.natural_height as usize) * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn image(href: &str, w: u32, h: u32) -> Arc<LoadedImage> {
        Arc::new(LoadedImage::new(href.to_string(), RgbaImage::new(w, h), None))
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 75,
            misses: 25,
            count: 10,
            memory_bytes: 1000,
        };
        assert!((stats.hit_rate() - 75.0).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = ImageCache::new(2);
        cache.insert("a.png".into(), image("a.png", 1, 1));
        cache.insert("b.png".into(), image("b.png", 2, 2));
        // touch a so b becomes least recently used
        assert!(cache.get("a.png").is_some());
        cache.insert("c.png".into(), image("c.png", 1, 1));

        assert!(cache.contains("a.png"));
        assert!(!cache.contains("b.png"));
        assert!(cache.get("b.png").is_none());

        let stats = cache.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.memory_bytes, 8);
    }
}
