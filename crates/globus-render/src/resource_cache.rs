//! GPU resource cache shared by all shapes across frames.
//!
//! Shapes store textures and other backend resources here under string keys,
//! tagged with a category and an approximate size. The cache is bounded by
//! total bytes; evicted resources are handed back through
//! [`GpuResourceCache::take_evicted`] so the frame driver can release them on
//! the backend.

use rustc_hash::FxHashMap;

use crate::TextureId;

/// A backend-owned resource tracked by the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuResource {
    Texture { id: TextureId, width: u32, height: u32 },
    Buffer { id: u64 },
}

/// Opaque capacity-bounded key-value store of GPU resources.
pub trait GpuResourceCache {
    fn get(&mut self, key: &str) -> Option<GpuResource>;

    fn put(&mut self, key: &str, resource: GpuResource, category: &'static str, size_in_bytes: usize);

    fn remove(&mut self, key: &str) -> Option<GpuResource>;

    fn contains(&self, key: &str) -> bool;

    fn capacity(&self) -> usize;

    fn used_capacity(&self) -> usize;

    /// Resources evicted or replaced since the last call.
    fn take_evicted(&mut self) -> Vec<GpuResource>;
}

struct Entry {
    resource: GpuResource,
    category: &'static str,
    size: usize,
    last_used: u64,
}

/// Least-recently-used [`GpuResourceCache`] bounded by total bytes.
pub struct BasicGpuResourceCache {
    entries: FxHashMap<String, Entry>,
    capacity: usize,
    used: usize,
    clock: u64,
    evicted: Vec<GpuResource>,
}

impl BasicGpuResourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity,
            used: 0,
            clock: 0,
            evicted: Vec::new(),
        }
    }

    /// Bytes used by entries of one category.
    pub fn used_capacity_of(&self, category: &str) -> usize {
        self.entries
            .values()
            .filter(|e| e.category == category)
            .map(|e| e.size)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_until_fits(&mut self, incoming: usize) {
        while self.used + incoming > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            let Some(key) = oldest else { break };
            if let Some(entry) = self.entries.remove(&key) {
                self.used -= entry.size;
                tracing::trace!(key, category = entry.category, "gpu resource evicted");
                self.evicted.push(entry.resource);
            }
        }
    }
}

impl Default for BasicGpuResourceCache {
    fn default() -> Self {
        Self::new(256 * 1024 * 1024)
    }
}

impl GpuResourceCache for BasicGpuResourceCache {
    fn get(&mut self, key: &str) -> Option<GpuResource> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|e| {
            e.last_used = clock;
            e.resource
        })
    }

    fn put(&mut self, key: &str, resource: GpuResource, category: &'static str, size_in_bytes: usize) {
        if let Some(old) = self.entries.remove(key) {
            self.used -= old.size;
            if old.resource != resource {
                self.evicted.push(old.resource);
            }
        }
        if size_in_bytes > self.capacity {
            tracing::debug!(key, size_in_bytes, "gpu resource larger than cache capacity");
            self.evicted.push(resource);
            return;
        }
        self.evict_until_fits(size_in_bytes);
        self.clock += 1;
        self.used += size_in_bytes;
        self.entries.insert(
            key.to_owned(),
            Entry {
                resource,
                category,
                size: size_in_bytes,
                last_used: self.clock,
            },
        );
    }

    fn remove(&mut self, key: &str) -> Option<GpuResource> {
        let entry = self.entries.remove(key)?;
        self.used -= entry.size;
        Some(entry.resource)
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn used_capacity(&self) -> usize {
        self.used
    }

    fn take_evicted(&mut self) -> Vec<GpuResource> {
        std::mem::take(&mut self.evicted)
    }
}
