//! Integer screen-space rectangles (viewports, pick rectangles).

/// An axis-aligned integer rectangle. The coordinate convention (top-left or
/// bottom-left origin) is decided by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A square of side `size` centered on `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, size: i32) -> Self {
        let half = f64::from(size) / 2.0;
        Self::new(
            (cx - half).floor() as i32,
            (cy - half).floor() as i32,
            size,
            size,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn max_x(&self) -> i32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= f64::from(self.x)
            && x < f64::from(self.max_x())
            && y >= f64::from(self.y)
            && y < f64::from(self.max_y())
    }

    /// Overlap of the two rectangles; empty when they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.max_x().min(other.max_x());
        let y1 = self.max_y().min(other.max_y());
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection_clips() {
        let viewport = Rect::new(0, 0, 100, 100);
        let r = Rect::new(90, 95, 20, 20).intersection(&viewport);
        assert_eq!(r, Rect::new(90, 95, 10, 5));
        assert!(Rect::new(200, 0, 5, 5).intersection(&viewport).is_empty());
    }

    #[test]
    fn test_centered_square() {
        assert_eq!(Rect::centered(10.0, 10.0, 5), Rect::new(7, 7, 5, 5));
    }
}
