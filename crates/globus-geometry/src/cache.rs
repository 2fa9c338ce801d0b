//! Capacity-bounded store of generated geometry keyed by structural tuples.
//!
//! Keys describe *what* was generated (shape class, tessellation counts,
//! orientation, locations, altitudes) rather than *which shape* asked for it, so
//! identical shapes share entries. Entries are evicted least-recently-used
//! first once the byte capacity is exceeded.

use std::rc::Rc;

use globus_math::{GlobeStateKey, LatLon};
use rustc_hash::FxHashMap;

use crate::{ExpiryStamp, Geometry};

/// One component of a [`CacheKey`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Int(i64),
    /// An `f64` compared by bit pattern.
    Float(u64),
    Flag(bool),
    Text(String),
}

/// Structural cache key: a shape class name followed by ordered parts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    class: &'static str,
    parts: Vec<KeyPart>,
}

impl CacheKey {
    pub fn new(class: &'static str) -> Self {
        Self {
            class,
            parts: Vec::new(),
        }
    }

    pub fn int(mut self, value: i64) -> Self {
        self.parts.push(KeyPart::Int(value));
        self
    }

    pub fn float(mut self, value: f64) -> Self {
        // Fold -0.0 into 0.0 so equal values hash equally.
        let value = if value == 0.0 { 0.0 } else { value };
        self.parts.push(KeyPart::Float(value.to_bits()));
        self
    }

    pub fn flag(mut self, value: bool) -> Self {
        self.parts.push(KeyPart::Flag(value));
        self
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.parts.push(KeyPart::Text(value.into()));
        self
    }

    pub fn lat_lon(self, location: LatLon) -> Self {
        self.float(location.latitude.radians())
            .float(location.longitude.radians())
    }

    pub fn class(&self) -> &'static str {
        self.class
    }
}

/// Hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Entry {
    geometry: Rc<Geometry>,
    stamp: Option<ExpiryStamp>,
    size: usize,
    last_used: u64,
}

/// LRU geometry cache bounded by total `size_in_bytes` of its entries.
pub struct GeometryCache {
    entries: FxHashMap<CacheKey, Entry>,
    capacity: usize,
    used: usize,
    clock: u64,
    stats: CacheStats,
}

impl GeometryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity,
            used: 0,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    /// Look up an entry regardless of its expiry stamp.
    pub fn get(&mut self, key: &CacheKey) -> Option<Rc<Geometry>> {
        self.clock += 1;
        let clock = self.clock;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = clock;
                self.stats.hits += 1;
                Some(Rc::clone(&entry.geometry))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up an entry and require its stamp to be valid for the current
    /// frame. Entries without a stamp are always valid. Stale entries count as
    /// misses and are left in place to be overwritten.
    pub fn get_valid(
        &mut self,
        key: &CacheKey,
        now_ms: u64,
        globe_key: GlobeStateKey,
        vertical_exaggeration: f64,
    ) -> Option<Rc<Geometry>> {
        self.clock += 1;
        let clock = self.clock;
        let valid = self.entries.get_mut(key).filter(|entry| {
            entry
                .stamp
                .is_none_or(|s| s.is_valid(now_ms, globe_key, vertical_exaggeration))
        });
        match valid {
            Some(entry) => {
                entry.last_used = clock;
                self.stats.hits += 1;
                Some(Rc::clone(&entry.geometry))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace an entry, evicting least-recently-used entries until
    /// it fits. Geometry larger than the whole capacity is returned but not
    /// retained.
    pub fn put(
        &mut self,
        key: CacheKey,
        geometry: Geometry,
        stamp: Option<ExpiryStamp>,
    ) -> Rc<Geometry> {
        let geometry = Rc::new(geometry);
        let size = geometry.size_in_bytes();
        self.remove(&key);
        if size > self.capacity {
            tracing::debug!(
                class = key.class(),
                size,
                capacity = self.capacity,
                "geometry larger than cache capacity, not cached"
            );
            return geometry;
        }
        self.evict_until_fits(size);
        self.clock += 1;
        self.used += size;
        self.entries.insert(
            key,
            Entry {
                geometry: Rc::clone(&geometry),
                stamp,
                size,
                last_used: self.clock,
            },
        );
        geometry
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.used -= entry.size;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.used = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used_capacity(&self) -> usize {
        self.used
    }

    /// Change the capacity, evicting immediately if the cache is now over it.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_until_fits(0);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn evict_until_fits(&mut self, incoming: usize) {
        if self.used + incoming <= self.capacity {
            return;
        }
        let mut candidates: Vec<(u64, CacheKey)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.last_used, k.clone()))
            .collect();
        candidates.sort_unstable_by_key(|(t, _)| *t);

        let mut evicted = 0usize;
        for (_, key) in candidates {
            if self.used + incoming <= self.capacity {
                break;
            }
            if self.remove(&key) {
                evicted += 1;
            }
        }
        tracing::trace!(evicted, used = self.used, "geometry cache eviction");
    }
}

impl std::fmt::Debug for GeometryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryCache")
            .field("entries", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DrawMode, ExpiryPolicy};
    use glam::DVec3;

    fn geometry(n: usize) -> Geometry {
        Geometry::from_points(&vec![DVec3::ZERO; n], DVec3::ZERO)
    }

    fn globe_key() -> GlobeStateKey {
        GlobeStateKey {
            globe_id: 1,
            elevation_version: 0,
        }
    }

    /// Identical keys built independently address the same entry.
    #[test]
    fn test_structural_keys_are_equal() {
        let a = CacheKey::new("Box").int(4).float(1000.0).flag(true);
        let b = CacheKey::new("Box").int(4).float(1000.0).flag(true);
        assert_eq!(a, b);
        assert_ne!(a, CacheKey::new("Orbit").int(4).float(1000.0).flag(true));
        assert_eq!(CacheKey::new("x").float(0.0), CacheKey::new("x").float(-0.0));
    }

    /// A hit returns the same shared geometry object.
    #[test]
    fn test_get_is_reference_stable() {
        let mut cache = GeometryCache::new(1 << 20);
        let key = CacheKey::new("Box").int(1);
        let stored = cache.put(key.clone(), geometry(10), None);
        let fetched = cache.get(&key).unwrap();
        assert!(Rc::ptr_eq(&stored, &fetched));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 0 });
    }

    /// The least recently used entry is evicted first.
    #[test]
    fn test_lru_eviction() {
        // Each entry: 10 vertices * 12 bytes.
        let mut cache = GeometryCache::new(240);
        let (a, b, c) = (
            CacheKey::new("t").int(1),
            CacheKey::new("t").int(2),
            CacheKey::new("t").int(3),
        );
        cache.put(a.clone(), geometry(10), None);
        cache.put(b.clone(), geometry(10), None);
        cache.get(&a);
        cache.put(c.clone(), geometry(10), None);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.used_capacity(), 240);
    }

    #[test]
    fn test_oversized_entry_not_retained() {
        let mut cache = GeometryCache::new(100);
        let g = cache.put(CacheKey::new("big"), geometry(100), None);
        assert_eq!(g.vertex_count(), 100);
        assert!(cache.is_empty());
        assert_eq!(cache.used_capacity(), 0);
    }

    /// A stamp mismatch turns a key hit into a miss.
    #[test]
    fn test_get_valid_checks_stamp() {
        let mut cache = GeometryCache::new(1 << 20);
        let key = CacheKey::new("Orbit");
        let stamp = ExpiryPolicy::default().stamp(0, globe_key(), 1.0, false);
        cache.put(key.clone(), geometry(4), Some(stamp));
        assert!(cache.get_valid(&key, 10, globe_key(), 1.0).is_some());
        assert!(cache.get_valid(&key, 10, globe_key(), 3.0).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_replace_and_set_capacity() {
        let mut cache = GeometryCache::new(1 << 20);
        let key = CacheKey::new("idx");
        cache.put(key.clone(), Geometry::from_indices(DrawMode::Triangles, vec![0; 6]), None);
        cache.put(key.clone(), Geometry::from_indices(DrawMode::Triangles, vec![0; 3]), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_capacity(), 12);
        cache.set_capacity(0);
        assert!(cache.is_empty());
    }
}
