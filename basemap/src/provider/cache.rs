//! In-memory cache of downloaded tile bytes using moka.
//!
//! Keyed by provider id and tile address so one cache can be shared across
//! provider switches. Entries are weighted by their encoded size.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::future::Cache;

use crate::coord::TileCoord;

/// Default cache capacity: 64 MB of encoded tiles.
pub const DEFAULT_TILE_CACHE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TileCacheKey {
    provider: Arc<str>,
    coord: TileCoord,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub size_bytes: u64,
}

impl TileCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Shared, size-bounded LRU cache of encoded tile images.
///
/// Cloning is cheap and clones share storage and counters.
#[derive(Clone)]
pub struct TileCache {
    cache: Cache<TileCacheKey, Arc<Vec<u8>>>,
    counters: Arc<Counters>,
}

impl TileCache {
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = Cache::builder()
            .weigher(|_key: &TileCacheKey, value: &Arc<Vec<u8>>| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();

        Self {
            cache,
            counters: Arc::new(Counters {
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub async fn get(&self, provider: &str, coord: TileCoord) -> Option<Arc<Vec<u8>>> {
        let key = TileCacheKey {
            provider: Arc::from(provider),
            coord,
        };
        match self.cache.get(&key).await {
            Some(data) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(data)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn put(&self, provider: &str, coord: TileCoord, data: Arc<Vec<u8>>) {
        let key = TileCacheKey {
            provider: Arc::from(provider),
            coord,
        };
        self.cache.insert(key, data).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    pub async fn stats(&self) -> TileCacheStats {
        self.cache.run_pending_tasks().await;
        TileCacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
            size_bytes: self.cache.weighted_size(),
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_CACHE_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = TileCache::new(1024 * 1024);
        let coord = TileCoord::new(1, 2, 3);

        assert!(cache.get("osm", coord).await.is_none());
        cache.put("osm", coord, Arc::new(vec![1, 2, 3])).await;

        let data = cache.get("osm", coord).await.unwrap();
        assert_eq!(*data, vec![1, 2, 3]);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_keys_are_per_provider() {
        let cache = TileCache::default();
        let coord = TileCoord::new(0, 0, 0);
        cache.put("osm", coord, Arc::new(vec![1])).await;

        assert!(cache.get("esri", coord).await.is_none());
        assert!(cache.get("osm", coord).await.is_some());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = TileCache::default();
        let clone = cache.clone();
        let coord = TileCoord::new(4, 5, 6);
        cache.put("osm", coord, Arc::new(vec![9; 16])).await;

        assert!(clone.get("osm", coord).await.is_some());
        clone.clear().await;
        assert!(cache.get("osm", coord).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_bounded() {
        let cache = TileCache::new(1000);
        for i in 0..20 {
            cache
                .put("osm", TileCoord::new(i, 0, 10), Arc::new(vec![0; 200]))
                .await;
        }
        let stats = cache.stats().await;
        assert!(stats.size_bytes <= 1000, "size {} exceeds capacity", stats.size_bytes);
    }
}
