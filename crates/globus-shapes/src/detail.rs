//! Screen-size-driven level-of-detail tiers for tessellated shapes.

use globus_math::Sphere;
use globus_render::View;

/// Tessellation density used at one level of detail.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailLevel {
    /// Minimum on-screen size, in pixels, at which this level applies.
    pub screen_size: f64,
    pub slices: u32,
    pub stacks: u32,
    pub loops: u32,
    pub pillars: u32,
    /// Segments along each straight side of stadium shapes.
    pub length_slices: u32,
    /// Coarse levels may skip terrain conformance altogether.
    pub disable_terrain_conformance: bool,
}

impl DetailLevel {
    pub fn new(screen_size: f64) -> Self {
        Self {
            screen_size,
            slices: 32,
            stacks: 1,
            loops: 4,
            pillars: 8,
            length_slices: 16,
            disable_terrain_conformance: false,
        }
    }
}

/// Default five-tier ladder, finest first.
pub fn default_detail_levels() -> Vec<DetailLevel> {
    let tiers: [(f64, u32, u32, u32, bool); 5] = [
        (3000.0, 32, 8, 4, false),
        (1000.0, 26, 6, 3, false),
        (200.0, 20, 4, 2, false),
        (100.0, 14, 2, 1, false),
        (0.0, 8, 1, 1, true),
    ];
    tiers
        .into_iter()
        .map(|(screen_size, slices, pillars, loops, coarse)| DetailLevel {
            screen_size,
            slices,
            stacks: 1,
            loops,
            pillars,
            length_slices: (slices / 2).max(1),
            disable_terrain_conformance: coarse,
        })
        .collect()
}

/// Sort levels finest (largest screen size) first.
pub fn sort_detail_levels(levels: &mut [DetailLevel]) {
    levels.sort_by(|a, b| b.screen_size.total_cmp(&a.screen_size));
}

/// On-screen diameter of `extent` in pixels.
pub fn screen_size_of(view: &dyn View, extent: &Sphere) -> f64 {
    let distance = (view.eye_point() - extent.center).length();
    let pixel = view.compute_pixel_size_at_distance(distance);
    if pixel <= 0.0 {
        return f64::INFINITY;
    }
    extent.diameter() / pixel
}

/// The first level (finest first) whose screen-size threshold the extent
/// meets, or the coarsest level when none does.
pub fn select_detail_level<'a>(levels: &'a [DetailLevel], screen_size: f64) -> Option<&'a DetailLevel> {
    levels
        .iter()
        .find(|level| screen_size >= level.screen_size)
        .or_else(|| levels.last())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Larger on-screen shapes get denser tessellation.
    #[test]
    fn test_select_by_screen_size() {
        let levels = default_detail_levels();
        assert_eq!(select_detail_level(&levels, 5000.0).unwrap().slices, 32);
        assert_eq!(select_detail_level(&levels, 500.0).unwrap().slices, 20);
        let coarse = select_detail_level(&levels, 10.0).unwrap();
        assert_eq!(coarse.slices, 8);
        assert!(coarse.disable_terrain_conformance);
    }

    #[test]
    fn test_sort_finest_first() {
        let mut levels = vec![DetailLevel::new(1.0), DetailLevel::new(100.0), DetailLevel::new(10.0)];
        sort_detail_levels(&mut levels);
        let sizes: Vec<f64> = levels.iter().map(|l| l.screen_size).collect();
        assert_eq!(sizes, vec![100.0, 10.0, 1.0]);
        assert!(select_detail_level(&[], 1.0).is_none());
    }
}
