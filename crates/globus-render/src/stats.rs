//! Per-frame statistics accumulated by renderers.

/// Statistic keys reported by the renderers in this workspace.
pub mod keys {
    /// Enables every statistic.
    pub const ALL: &str = "All";
    pub const ORDERED_RENDERABLES: &str = "OrderedRenderables";
    pub const ORDERED_SURFACE_RENDERABLES: &str = "OrderedSurfaceRenderables";
    pub const AIRSPACE_GEOMETRY_COUNT: &str = "AirspaceGeometryCount";
    pub const AIRSPACE_VERTEX_COUNT: &str = "AirspaceVertexCount";
    pub const PATH_POSITIONS: &str = "PathPositions";
    pub const PICKED_OBJECTS: &str = "PickedObjects";
}

/// One named value reported for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PerFrameStatistic {
    pub key: String,
    pub display_name: String,
    pub value: f64,
}
