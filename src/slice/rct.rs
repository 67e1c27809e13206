// src/slice/rct.rs

//! Reversible colour transform of RGB slices.
//!
//! ```text
//! b' = b - g + offset
//! r' = r - g + offset
//! g' = g + ((b - g) * by + (r - g) * ry) >> 2
//! ```
//!
//! `offset` is `1 << bits`, so `b'` and `r'` fit in `bits + 1` unsigned
//! bits. The encoder picks `(by, ry)` per slice from a fixed candidate list.

use crate::image::geom::Rect;
use crate::image::image_formats::Plane;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RctCoefficients {
    pub by: u32,
    pub ry: u32,
}

impl Default for RctCoefficients {
    /// The transform of streams that do not transmit coefficients.
    fn default() -> Self {
        RctCoefficients { by: 1, ry: 1 }
    }
}

/// Candidate `(ry, by)` pairs, cheapest to evaluate in this order.
const CANDIDATES: [(u32, u32); 15] = [
    (0, 0),
    (1, 1),
    (2, 2),
    (0, 2),
    (2, 0),
    (4, 0),
    (0, 4),
    (0, 3),
    (3, 0),
    (3, 1),
    (1, 3),
    (1, 2),
    (2, 1),
    (0, 1),
    (1, 0),
];

impl RctCoefficients {
    pub fn new(by: u32, ry: u32) -> Self {
        RctCoefficients { by, ry }
    }

    /// Coefficient sums above 4 are not reversible within the sample range.
    pub fn is_valid(&self) -> bool {
        (self.by as u64 + self.ry as u64) <= 4
    }

    #[inline(always)]
    fn luma_shift(&self, b: i32, r: i32) -> i32 {
        (b * self.by as i32 + r * self.ry as i32) >> 2
    }

    /// `(g, b, r) -> (g', b', r')`
    #[inline]
    pub fn forward(&self, g: i32, b: i32, r: i32, offset: i32) -> (i32, i32, i32) {
        let b = b - g;
        let r = r - g;
        (g + self.luma_shift(b, r), b + offset, r + offset)
    }

    /// `(g', b', r') -> (g, b, r)`
    #[inline]
    pub fn inverse(&self, y: i32, cb: i32, cr: i32, offset: i32) -> (i32, i32, i32) {
        let b = cb - offset;
        let r = cr - offset;
        let g = y - self.luma_shift(b, r);
        (g, b + g, r + g)
    }
}

/// Picks the coefficients that minimise the summed absolute second
/// difference of the transformed luma over the slice.
pub fn choose_rct_params(g: &Plane, b: &Plane, r: &Plane, rect: Rect) -> RctCoefficients {
    let w = rect.width;
    let mut stat = [0i64; CANDIDATES.len()];
    // Horizontal differences of the previous row, per channel.
    let mut above = vec![[0i32; 3]; w];

    for y in 0..rect.height {
        let rows = [
            &g.row(rect.y + y)[rect.x..rect.x_max()],
            &b.row(rect.y + y)[rect.x..rect.x_max()],
            &r.row(rect.y + y)[rect.x..rect.x_max()],
        ];
        let mut last = [0i32; 3];
        for x in 0..w {
            let cur = [rows[0][x] as i32, rows[1][x] as i32, rows[2][x] as i32];
            let d = [cur[0] - last[0], cur[1] - last[1], cur[2] - last[2]];
            if x > 0 && y > 0 {
                let bg = d[0] - above[x][0];
                let bb = d[1] - above[x][1] - bg;
                let br = d[2] - above[x][2] - bg;
                for (s, &(ry, by)) in stat.iter_mut().zip(CANDIDATES.iter()) {
                    *s += (bg + ((br * ry as i32 + bb * by as i32) >> 2)).abs() as i64;
                }
            }
            above[x] = d;
            last = cur;
        }
    }

    let mut best = 0;
    for i in 1..CANDIDATES.len() {
        if stat[i] < stat[best] {
            best = i;
        }
    }
    let (ry, by) = CANDIDATES[best];
    RctCoefficients { by, ry }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_is_reversible() {
        for (by, ry) in CANDIDATES.iter().map(|&(ry, by)| (by, ry)) {
            let t = RctCoefficients::new(by, ry);
            assert!(t.is_valid());
            for &(g, b, r) in &[(0, 0, 0), (255, 0, 255), (17, 200, 3), (1023, 1023, 0)] {
                let (y, cb, cr) = t.forward(g, b, r, 1 << 10);
                assert!(cb >= 0 && cr >= 0 && cb < 1 << 11 && cr < 1 << 11);
                assert_eq!(t.inverse(y, cb, cr, 1 << 10), (g, b, r));
            }
        }
        assert!(!RctCoefficients::new(3, 2).is_valid());
    }

    #[test]
    fn test_gray_content_prefers_plain_green() {
        // With R == G == B every candidate costs the same; the first wins.
        let p = Plane::from_fn(8, 8, |x, y| (x * 3 + y * y) as u16);
        let c = choose_rct_params(&p, &p, &p, Rect::new(0, 0, 8, 8));
        assert_eq!(c, RctCoefficients::new(0, 0));
    }

    #[test]
    fn test_red_driven_content_weights_red() {
        // Green is flat; red carries all the structure, blue none.
        let g = Plane::from_fn(16, 16, |_, _| 100);
        let b = Plane::from_fn(16, 16, |_, _| 100);
        let r = Plane::from_fn(16, 16, |x, y| ((x * 37 + y * 11) % 200) as u16);
        let c = choose_rct_params(&g, &b, &r, Rect::new(0, 0, 16, 16));
        // Any candidate without a red weight costs nothing; the first of them wins.
        assert_eq!(c.ry, 0);
    }
}
