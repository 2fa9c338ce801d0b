//! Procedural mesh generation and keyed geometry caching for volumetric shapes.

pub mod builder;
pub mod cache;
pub mod error;
pub mod expiry;
pub mod geometry;

pub use builder::{GeometryBuilder, Orientation};
pub use cache::{CacheKey, CacheStats, GeometryCache, KeyPart};
pub use error::GeometryError;
pub use expiry::{ExpiryPolicy, ExpiryStamp};
pub use geometry::{DrawMode, Geometry, Vertex};
