//! Radian-backed angles with degree conversion and normalisation.

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// An angle stored in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Angle {
    radians: f64,
}

impl Angle {
    /// The zero angle.
    pub const ZERO: Angle = Angle { radians: 0.0 };
    /// A right angle.
    pub const POS90: Angle = Angle {
        radians: PI / 2.0,
    };
    /// A straight angle.
    pub const POS180: Angle = Angle { radians: PI };
    /// A full turn.
    pub const POS360: Angle = Angle { radians: TAU };

    /// Create an angle from radians.
    #[inline]
    #[must_use]
    pub const fn from_radians(radians: f64) -> Self {
        Self { radians }
    }

    /// Create an angle from degrees.
    #[inline]
    #[must_use]
    pub fn from_degrees(degrees: f64) -> Self {
        Self {
            radians: degrees.to_radians(),
        }
    }

    /// The angle in radians.
    #[inline]
    pub fn radians(self) -> f64 {
        self.radians
    }

    /// The angle in degrees.
    #[inline]
    pub fn degrees(self) -> f64 {
        self.radians.to_degrees()
    }

    pub fn sin(self) -> f64 {
        self.radians.sin()
    }

    pub fn cos(self) -> f64 {
        self.radians.cos()
    }

    pub fn tan(self) -> f64 {
        self.radians.tan()
    }

    /// The absolute value of this angle.
    pub fn abs(self) -> Self {
        Self::from_radians(self.radians.abs())
    }

    /// Normalise to the range `[-180, 180)` degrees.
    #[must_use]
    pub fn normalized_longitude(self) -> Self {
        let r = (self.radians + PI).rem_euclid(TAU) - PI;
        Self::from_radians(r)
    }

    /// Clamp to the range `[-90, 90]` degrees.
    #[must_use]
    pub fn clamped_latitude(self) -> Self {
        Self::from_radians(self.radians.clamp(-PI / 2.0, PI / 2.0))
    }

    /// Linear interpolation between two angles.
    #[must_use]
    pub fn mix(t: f64, a: Angle, b: Angle) -> Self {
        Self::from_radians(a.radians + t * (b.radians - a.radians))
    }

    /// Half the arc between this angle and `other`, as seen from this angle.
    #[must_use]
    pub fn midpoint(self, other: Angle) -> Self {
        Self::mix(0.5, self, other)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}\u{b0}", self.degrees())
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        Angle::from_radians(self.radians + rhs.radians)
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        Angle::from_radians(self.radians - rhs.radians)
    }
}

impl Mul<f64> for Angle {
    type Output = Angle;

    fn mul(self, rhs: f64) -> Angle {
        Angle::from_radians(self.radians * rhs)
    }
}

impl Div<f64> for Angle {
    type Output = Angle;

    fn div(self, rhs: f64) -> Angle {
        Angle::from_radians(self.radians / rhs)
    }
}

impl Neg for Angle {
    type Output = Angle;

    fn neg(self) -> Angle {
        Angle::from_radians(-self.radians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_round_trip() {
        let a = Angle::from_degrees(33.5);
        assert!((a.degrees() - 33.5).abs() < 1e-12);
    }

    /// Longitudes past the antimeridian wrap back into range.
    #[test]
    fn test_normalized_longitude_wraps() {
        let a = Angle::from_degrees(190.0).normalized_longitude();
        assert!((a.degrees() + 170.0).abs() < 1e-9);
        let b = Angle::from_degrees(-540.0).normalized_longitude();
        assert!((b.degrees() + 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_latitude_clamp() {
        assert_eq!(Angle::from_degrees(120.0).clamped_latitude(), Angle::POS90);
    }
}
