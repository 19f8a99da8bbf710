//! Per-context tile cache.
//!
//! Tiles are keyed by `(band identity, rectangle)` with exact equality; a
//! request for an overlapping but different rectangle is a miss. Entries are
//! evicted least-recently-used first, bounded by entry count and by an
//! approximate memory budget.

use crate::core::error::BandId;
use crate::core::rect::Rectangle;
use crate::core::tile::Tile;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Default maximum number of cached tiles per context.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default memory budget per context, in megabytes.
pub const DEFAULT_MEMORY_MB: usize = 256;

/// A cache key combining band identity with the requested rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// The band.
    pub band: BandId,
    /// The exact rectangle requested.
    pub rect: Rectangle,
}

impl TileKey {
    /// Create a new cache key.
    pub fn new(band: BandId, rect: Rectangle) -> Self {
        Self { band, rect }
    }
}

/// Cached entry with metadata.
#[derive(Debug, Clone)]
struct CacheEntry {
    tile: Arc<Tile>,
    computation_time: Duration,
    memory_size: usize,
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries evicted.
    pub evictions: u64,
    /// Total computation time saved by cache hits.
    pub time_saved: Duration,
}

impl CacheStats {
    /// Calculate hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Thread-safe tile cache.
pub struct TileCache {
    cache: Mutex<LruCache<TileKey, CacheEntry>>,
    max_memory: usize,
    current_memory: Mutex<usize>,
    stats: Mutex<CacheStats>,
}

impl TileCache {
    /// Create a cache holding at most `capacity` tiles.
    pub fn new(capacity: usize) -> Self {
        Self::with_memory_limit(capacity, DEFAULT_MEMORY_MB)
    }

    /// Create a cache with a custom memory limit.
    pub fn with_memory_limit(capacity: usize, max_memory_mb: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            max_memory: max_memory_mb.saturating_mul(1024 * 1024),
            current_memory: Mutex::new(0),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Get a cached tile.
    pub fn get(&self, key: &TileKey) -> Option<Arc<Tile>> {
        let mut cache = self.cache.lock();
        let mut stats = self.stats.lock();
        match cache.get(key) {
            Some(entry) => {
                stats.hits += 1;
                stats.time_saved += entry.computation_time;
                Some(Arc::clone(&entry.tile))
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Check for a tile without touching statistics or recency.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache.lock().contains(key)
    }

    /// Store a computed tile.
    pub fn put(&self, key: TileKey, tile: Arc<Tile>, computation_time: Duration) {
        let entry = CacheEntry {
            memory_size: tile.memory_size(),
            tile,
            computation_time,
        };
        let entry_size = entry.memory_size;

        let mut cache = self.cache.lock();
        let mut current = self.current_memory.lock();

        if let Some(old) = cache.pop(&key) {
            *current = current.saturating_sub(old.memory_size);
        }

        // Evict entries if needed to stay under memory limit
        while *current + entry_size > self.max_memory {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.memory_size);
                    self.stats.lock().evictions += 1;
                }
                None => break,
            }
        }

        if let Some((_, evicted)) = cache.push(key, entry) {
            *current = current.saturating_sub(evicted.memory_size);
            self.stats.lock().evictions += 1;
        }
        *current += entry_size;
    }

    /// Invalidate all entries of a band.
    pub fn invalidate_band(&self, band: BandId) {
        let mut cache = self.cache.lock();
        let keys_to_remove: Vec<_> = cache
            .iter()
            .filter(|(k, _)| k.band == band)
            .map(|(k, _)| *k)
            .collect();

        let mut total_freed = 0;
        for key in keys_to_remove {
            if let Some(entry) = cache.pop(&key) {
                total_freed += entry.memory_size;
            }
        }

        let mut current = self.current_memory.lock();
        *current = current.saturating_sub(total_freed);
    }

    /// Clear the entire cache.
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
        *self.current_memory.lock() = 0;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Get current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        *self.current_memory.lock()
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether the cache holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
