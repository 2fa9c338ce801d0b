//! Validity stamps for generated geometry.
//!
//! Geometry produced for a shape depends on the globe it was generated against
//! and on the vertical exaggeration in effect. Terrain-conforming geometry is
//! additionally re-sampled periodically as higher-resolution elevations arrive.

use globus_math::GlobeStateKey;
use rand::Rng;

/// Conditions under which a piece of cached geometry stays valid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpiryStamp {
    pub globe_key: Option<GlobeStateKey>,
    pub vertical_exaggeration: f64,
    /// Frame time after which the geometry must be regenerated; `None` never expires.
    pub expires_at_ms: Option<u64>,
}

impl ExpiryStamp {
    /// A stamp that never expires and matches only the given globe state.
    pub fn permanent(globe_key: GlobeStateKey, vertical_exaggeration: f64) -> Self {
        Self {
            globe_key: Some(globe_key),
            vertical_exaggeration,
            expires_at_ms: None,
        }
    }

    /// Whether geometry carrying this stamp may be reused for the given frame.
    pub fn is_valid(&self, now_ms: u64, globe_key: GlobeStateKey, vertical_exaggeration: f64) -> bool {
        if self.globe_key != Some(globe_key) {
            return false;
        }
        if self.vertical_exaggeration != vertical_exaggeration {
            return false;
        }
        match self.expires_at_ms {
            Some(t) => now_ms < t,
            None => true,
        }
    }
}

/// Bounds of the randomized lifetime given to terrain-conforming geometry.
///
/// The jitter keeps many shapes created on the same frame from all expiring on
/// the same later frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            min_ms: 2000,
            max_ms: 6000,
        }
    }
}

impl ExpiryPolicy {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// Stamp geometry generated at `now_ms`.
    pub fn stamp(
        &self,
        now_ms: u64,
        globe_key: GlobeStateKey,
        vertical_exaggeration: f64,
        terrain_conforming: bool,
    ) -> ExpiryStamp {
        let expires_at_ms = terrain_conforming.then(|| {
            let lifetime = rand::rng().random_range(self.min_ms..=self.max_ms);
            now_ms.saturating_add(lifetime)
        });
        ExpiryStamp {
            globe_key: Some(globe_key),
            vertical_exaggeration,
            expires_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(version: u64) -> GlobeStateKey {
        GlobeStateKey {
            globe_id: 7,
            elevation_version: version,
        }
    }

    /// Non-conforming geometry never expires by time.
    #[test]
    fn test_non_conforming_never_expires() {
        let stamp = ExpiryPolicy::default().stamp(1000, key(0), 1.0, false);
        assert_eq!(stamp.expires_at_ms, None);
        assert!(stamp.is_valid(u64::MAX, key(0), 1.0));
    }

    /// Conforming geometry expires between the policy bounds.
    #[test]
    fn test_conforming_expiry_within_bounds() {
        let policy = ExpiryPolicy::new(2000, 6000);
        for _ in 0..50 {
            let stamp = policy.stamp(10_000, key(0), 1.0, true);
            let t = stamp.expires_at_ms.unwrap();
            assert!((12_000..=16_000).contains(&t));
            assert!(stamp.is_valid(11_999, key(0), 1.0));
            assert!(!stamp.is_valid(16_000, key(0), 1.0));
        }
    }

    /// A different globe state or exaggeration invalidates the stamp.
    #[test]
    fn test_globe_and_exaggeration_mismatch() {
        let stamp = ExpiryStamp::permanent(key(0), 1.0);
        assert!(!stamp.is_valid(0, key(1), 1.0));
        assert!(!stamp.is_valid(0, key(0), 2.0));
    }

    #[test]
    fn test_policy_orders_bounds() {
        let policy = ExpiryPolicy::new(5, 1);
        assert_eq!(policy.min_ms, 1);
        assert_eq!(policy.max_ms, 5);
    }
}
