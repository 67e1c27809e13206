// src/image/geom.rs

//! Rectangles in sample coordinates.

/// A rectangle with its top-left corner at (`x`, `y`).
///
/// The struct is `Copy`, so it is passed around by value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

#[inline]
fn ceil_shift(v: usize, shift: u32) -> usize {
    (v + (1 << shift) - 1) >> shift
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (`x + width`), exclusive.
    pub fn x_max(&self) -> usize {
        self.x + self.width
    }

    /// Bottom edge (`y + height`), exclusive.
    pub fn y_max(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// The right and bottom edges are exclusive.
    pub fn contains(&self, px: usize, py: usize) -> bool {
        px >= self.x && px < self.x_max() && py >= self.y && py < self.y_max()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x_max = self.x_max().min(other.x_max());
        let y_max = self.y_max().min(other.y_max());
        if x >= x_max || y >= y_max {
            Rect::default()
        } else {
            Rect::new(x, y, x_max - x, y_max - y)
        }
    }

    /// The matching region of a plane subsampled by `2^h_shift x 2^v_shift`.
    ///
    /// Both edges round up, so neighbouring rectangles map to neighbouring
    /// regions even when their edges are not multiples of the subsampling.
    pub fn subsampled(&self, h_shift: u32, v_shift: u32) -> Rect {
        let x = ceil_shift(self.x, h_shift);
        let y = ceil_shift(self.y, v_shift);
        Rect::new(
            x,
            y,
            ceil_shift(self.x_max(), h_shift) - x,
            ceil_shift(self.y_max(), v_shift) - y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 4, 10, 10);
        assert_eq!(a.intersection(&b), Rect::new(5, 4, 5, 6));
        assert!(a.intersection(&Rect::new(10, 0, 3, 3)).is_empty());
    }

    #[test]
    fn test_contains_excludes_far_edges() {
        let r = Rect::new(2, 3, 4, 5);
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 7));
        assert!(!r.contains(6, 7));
        assert!(!r.contains(5, 8));
    }

    #[test]
    fn test_subsampled_regions_tile() {
        // Split 15 columns at an odd boundary; halves must still meet.
        let left = Rect::new(0, 0, 7, 5);
        let right = Rect::new(7, 0, 8, 5);
        let l = left.subsampled(1, 1);
        let r = right.subsampled(1, 1);
        assert_eq!(l.x_max(), r.x);
        assert_eq!(r.x_max(), 8);
        assert_eq!(l.height, 3);
        assert_eq!(Rect::new(4, 2, 8, 4).subsampled(1, 1), Rect::new(2, 1, 4, 2));
    }
}
