//! Geometry generation errors.

/// Errors raised by the geometry builder for invalid tessellation requests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A tessellation count was zero.
    #[error("{name} must be at least 1, got {value}")]
    InvalidDimension { name: &'static str, value: u32 },

    /// A radius, length, or width was negative or not finite.
    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidMeasure { name: &'static str, value: f64 },

    /// Inner radius exceeds outer radius.
    #[error("inner radius {inner} exceeds outer radius {outer}")]
    InvertedRadii { inner: f64, outer: f64 },
}
