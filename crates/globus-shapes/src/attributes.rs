//! Visual attributes shared by volumetric and draped shapes.

use globus_math::Color;

use crate::ShapeError;
use crate::error::invalid;

/// Interior and outline appearance of a shape.
///
/// Setters validate their input; the fields are read through accessors so an
/// attribute bundle is always internally consistent.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeAttributes {
    interior_color: Color,
    interior_opacity: f64,
    outline_color: Color,
    outline_opacity: f64,
    outline_width: f64,
    draw_interior: bool,
    draw_outline: bool,
    enable_lighting: bool,
}

impl Default for ShapeAttributes {
    fn default() -> Self {
        Self {
            interior_color: Color::WHITE,
            interior_opacity: 1.0,
            outline_color: Color::BLACK,
            outline_opacity: 1.0,
            outline_width: 1.0,
            draw_interior: true,
            draw_outline: false,
            enable_lighting: false,
        }
    }
}

impl ShapeAttributes {
    pub fn interior_color(&self) -> Color {
        self.interior_color
    }

    /// Interior color with the interior opacity applied.
    pub fn effective_interior_color(&self) -> Color {
        self.interior_color.with_opacity(self.interior_opacity)
    }

    pub fn set_interior_color(&mut self, color: Color) {
        self.interior_color = color;
    }

    pub fn interior_opacity(&self) -> f64 {
        self.interior_opacity
    }

    pub fn set_interior_opacity(&mut self, opacity: f64) -> Result<(), ShapeError> {
        self.interior_opacity = check_opacity(opacity)?;
        Ok(())
    }

    pub fn outline_color(&self) -> Color {
        self.outline_color
    }

    pub fn effective_outline_color(&self) -> Color {
        self.outline_color.with_opacity(self.outline_opacity)
    }

    pub fn set_outline_color(&mut self, color: Color) {
        self.outline_color = color;
    }

    pub fn outline_opacity(&self) -> f64 {
        self.outline_opacity
    }

    pub fn set_outline_opacity(&mut self, opacity: f64) -> Result<(), ShapeError> {
        self.outline_opacity = check_opacity(opacity)?;
        Ok(())
    }

    pub fn outline_width(&self) -> f64 {
        self.outline_width
    }

    pub fn set_outline_width(&mut self, width: f64) -> Result<(), ShapeError> {
        if !width.is_finite() || width < 0.0 {
            return Err(invalid(format!("outline width must be non-negative, got {width}")));
        }
        self.outline_width = width;
        Ok(())
    }

    pub fn draw_interior(&self) -> bool {
        self.draw_interior
    }

    pub fn set_draw_interior(&mut self, draw: bool) {
        self.draw_interior = draw;
    }

    pub fn draw_outline(&self) -> bool {
        self.draw_outline
    }

    pub fn set_draw_outline(&mut self, draw: bool) {
        self.draw_outline = draw;
    }

    pub fn enable_lighting(&self) -> bool {
        self.enable_lighting
    }

    pub fn set_enable_lighting(&mut self, enable: bool) {
        self.enable_lighting = enable;
    }

    /// Default appearance of a highlighted shape.
    pub fn highlight() -> Self {
        Self {
            interior_color: Color::rgb(255, 255, 255),
            interior_opacity: 0.8,
            outline_color: Color::rgb(255, 255, 0),
            outline_width: 2.0,
            draw_outline: true,
            ..Self::default()
        }
    }
}

fn check_opacity(opacity: f64) -> Result<f64, ShapeError> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(invalid(format!("opacity must be in [0, 1], got {opacity}")));
    }
    Ok(opacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_range_checked() {
        let mut a = ShapeAttributes::default();
        assert!(a.set_interior_opacity(0.5).is_ok());
        assert!(matches!(
            a.set_interior_opacity(1.5),
            Err(ShapeError::InvalidArgument(_))
        ));
        assert!(a.set_outline_opacity(-0.1).is_err());
        assert_eq!(a.interior_opacity(), 0.5);
    }

    #[test]
    fn test_negative_width_rejected() {
        let mut a = ShapeAttributes::default();
        assert!(a.set_outline_width(-1.0).is_err());
        assert!(a.set_outline_width(f64::NAN).is_err());
        assert!(a.set_outline_width(3.0).is_ok());
    }

    #[test]
    fn test_effective_color_applies_opacity() {
        let mut a = ShapeAttributes::default();
        a.set_interior_opacity(0.5).unwrap();
        assert_eq!(a.effective_interior_color().a, 128);
    }
}
