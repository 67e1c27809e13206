// src/model/context.rs

//! Per-plane adaptive state and the neighbourhood context function.

use super::quant::QuantTable;
use crate::coder::{SymbolState, VlcState, fresh_symbol_state};
use crate::utils::error::Result;

/// The causal neighbours of the sample being coded.
///
/// ```text
///          TT
///      LT  T  RT
///  LL  L   X
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbourhood {
    pub left: i32,
    pub top_left: i32,
    pub top: i32,
    pub top_right: i32,
    pub left_left: i32,
    pub top_top: i32,
}

#[inline(always)]
fn lut(table: &[i16; 256], d: i32) -> i32 {
    table[(d & 0xFF) as usize] as i32
}

impl Neighbourhood {
    /// Signed context index. The magnitude selects the adaptive state, the
    /// sign tells the caller to negate the residual.
    #[inline]
    pub fn context(&self, q: &QuantTable, far: bool) -> i32 {
        let mut ctx = lut(&q.inputs[0], self.left - self.top_left)
            + lut(&q.inputs[1], self.top_left - self.top)
            + lut(&q.inputs[2], self.top - self.top_right);
        if far {
            ctx += lut(&q.inputs[3], self.left_left - self.left)
                + lut(&q.inputs[4], self.top_top - self.top);
        }
        ctx
    }

    /// Median of `L`, `T` and the gradient `L + T - LT`.
    #[inline]
    pub fn predict(&self) -> i32 {
        median3(self.left, self.left + self.top - self.top_left, self.top)
    }
}

#[inline(always)]
pub fn median3(a: i32, b: i32, c: i32) -> i32 {
    if a > b {
        if c > b {
            if c > a { a } else { c }
        } else {
            b
        }
    } else if b > c {
        if c > a { c } else { a }
    } else {
        b
    }
}

/// Adaptive entropy state of one plane of one slice.
///
/// Both banks are kept so a slice can switch between the range and
/// Golomb-Rice paths when its coding parameters change.
#[derive(Debug, Clone, Default)]
pub struct PlaneContext {
    pub quant_index: usize,
    pub context_count: usize,
    pub states: Vec<SymbolState>,
    pub vlc: Vec<VlcState>,
}

impl PlaneContext {
    /// Points the plane at quantisation table `quant_index`. A change in
    /// context count discards the learned states.
    pub fn configure(&mut self, quant_index: usize, context_count: usize) -> Result<()> {
        self.quant_index = quant_index;
        if self.context_count != context_count {
            self.states.clear();
            self.vlc.clear();
        }
        self.context_count = context_count;
        if self.states.len() < context_count {
            self.states
                .try_reserve_exact(context_count - self.states.len())?;
            self.states.resize(context_count, fresh_symbol_state());
        }
        if self.vlc.len() < context_count {
            self.vlc.try_reserve_exact(context_count - self.vlc.len())?;
            self.vlc.resize(context_count, VlcState::default());
        }
        Ok(())
    }

    /// Restores every context to its initial state.
    pub fn reset(&mut self, initial: &[SymbolState]) {
        for (dst, src) in self.states.iter_mut().zip(initial) {
            *dst = *src;
        }
        self.vlc.fill(VlcState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_of_three() {
        assert_eq!(median3(1, 2, 3), 2);
        assert_eq!(median3(3, 1, 2), 2);
        assert_eq!(median3(2, 3, 1), 2);
        assert_eq!(median3(5, 5, 1), 5);
        assert_eq!(median3(-4, 7, 7), 7);
    }

    #[test]
    fn test_predict_follows_gradient() {
        let n = Neighbourhood {
            left: 10,
            top_left: 12,
            top: 14,
            ..Default::default()
        };
        // L + T - LT = 12 lies between L and T.
        assert_eq!(n.predict(), 12);
        let edge = Neighbourhood {
            left: 10,
            top_left: 0,
            top: 14,
            ..Default::default()
        };
        assert_eq!(edge.predict(), 14);
    }

    #[test]
    fn test_context_is_odd_in_the_gradients() {
        let q = QuantTable::large(false);
        let n = Neighbourhood {
            left: 40,
            top_left: 33,
            top: 20,
            top_right: 21,
            left_left: 90,
            top_top: 0,
        };
        let neg = Neighbourhood {
            left: -n.left,
            top_left: -n.top_left,
            top: -n.top,
            top_right: -n.top_right,
            left_left: -n.left_left,
            top_top: -n.top_top,
        };
        let c = n.context(&q, true);
        assert_eq!(neg.context(&q, true), -c);
        assert!((c.unsigned_abs() as usize) < q.context_count);
    }

    #[test]
    fn test_flat_neighbourhood_is_context_zero() {
        let q = QuantTable::small(false);
        let n = Neighbourhood {
            left: 7,
            top_left: 7,
            top: 7,
            top_right: 7,
            left_left: 7,
            top_top: 7,
        };
        assert_eq!(n.context(&q, false), 0);
    }

    #[test]
    fn test_plane_context_configure_and_reset() {
        let mut p = PlaneContext::default();
        p.configure(1, 666).unwrap();
        assert_eq!(p.states.len(), 666);
        p.states[3][0] = 17;
        p.vlc[3].bias = 5;
        let initial = vec![fresh_symbol_state(); 666];
        p.reset(&initial);
        assert_eq!(p.states[3][0], 128);
        assert_eq!(p.vlc[3], VlcState::default());
    }
}
