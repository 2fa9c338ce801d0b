//! Shapes drawn on the globe: volumetric airspaces, terrain-following paths,
//! placemarks, surface-draped imagery and text, and track markers.
//!
//! Every shape produces or reuses its geometry during its render pass and
//! then either draws through the ordered queue (airspaces, paths,
//! placemarks, track markers) or the ordered-surface FIFO (surface images,
//! polygons, text).

pub mod airspace;
pub mod altitude;
pub mod attributes;
pub mod detail;
pub mod error;
pub mod image;
pub mod multi_resolution_path;
pub mod path;
pub mod placemark;
mod surface;
pub mod surface_image;
pub mod surface_polygon;
pub mod surface_text;
pub mod track_renderer;

#[cfg(test)]
mod test_support;

pub use airspace::{
    Airspace, AirspaceBase, AirspaceGeometry, AirspaceInfo, AirspaceRenderer, BoxAirspace, Orbit,
    OrbitType, OrderedAirspace, PartialCappedCylinder, Route, TrackAirspace,
};
pub use altitude::{AltitudeDatum, AltitudeMode};
pub use attributes::ShapeAttributes;
pub use detail::DetailLevel;
pub use error::ShapeError;
pub use image::ImageSource;
pub use multi_resolution_path::{DistanceSkipCountComputer, MultiResolutionPath, SkipCountComputer};
pub use path::{OrderedPath, Path, PathType};
pub use placemark::{OrderedPlacemark, PlacemarkAttributes, PlacemarkRenderer, PointPlacemark};
pub use surface_image::SurfaceImage;
pub use surface_polygon::SurfacePolygon;
pub use surface_text::SurfaceText;
pub use track_renderer::{MarkerShape, Track, TrackPoint, TrackRenderer, TrackSegment};
