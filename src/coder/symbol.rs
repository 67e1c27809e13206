// src/coder/symbol.rs

//! Multi-bit integers on top of the binary range coder.
//!
//! A symbol is sent as a zero flag, a unary exponent, the mantissa below the
//! leading one, and optionally a sign. Each part draws from its own slice of a
//! 32-entry [`SymbolState`] bank:
//!
//! | index  | use                         |
//! |--------|-----------------------------|
//! | 0      | zero flag                   |
//! | 1..=10 | exponent (unary)            |
//! | 11..=21| sign, by exponent           |
//! | 22..=31| mantissa bits, by position  |

use super::range::{BitContext, INITIAL_STATE, RangeDecoder, RangeEncoder};

pub const CONTEXT_SIZE: usize = 32;

/// Adaptive state bank for one symbol context.
pub type SymbolState = [BitContext; CONTEXT_SIZE];

/// A bank with every state at the neutral probability.
pub const fn fresh_symbol_state() -> SymbolState {
    [INITIAL_STATE; CONTEXT_SIZE]
}

impl RangeEncoder {
    pub fn put_symbol(&mut self, state: &mut SymbolState, v: i32, signed: bool) {
        debug_assert!(signed || v >= 0);
        self.put_magnitude(state, v.unsigned_abs(), signed.then_some(v < 0));
    }

    #[inline]
    pub fn put_unsigned(&mut self, state: &mut SymbolState, v: u32) {
        self.put_magnitude(state, v, None);
    }

    fn put_magnitude(&mut self, state: &mut SymbolState, a: u32, sign: Option<bool>) {
        if a == 0 {
            self.put_bit(&mut state[0], true);
            return;
        }
        let e = 31 - a.leading_zeros() as usize;

        self.put_bit(&mut state[0], false);
        for i in 0..e {
            self.put_bit(&mut state[1 + i.min(9)], true);
        }
        self.put_bit(&mut state[1 + e.min(9)], false);
        for i in (0..e).rev() {
            self.put_bit(&mut state[22 + i.min(9)], (a >> i) & 1 != 0);
        }
        if let Some(negative) = sign {
            self.put_bit(&mut state[11 + e.min(10)], negative);
        }
    }
}

impl RangeDecoder<'_> {
    /// Reads a symbol. An exponent above 31 cannot come from a valid stream;
    /// the decoder is flagged corrupt and zero is returned.
    pub fn get_symbol(&mut self, state: &mut SymbolState, signed: bool) -> i32 {
        let (a, negative) = self.get_magnitude(state, signed);
        if negative {
            (a as i32).wrapping_neg()
        } else {
            a as i32
        }
    }

    #[inline]
    pub fn get_unsigned(&mut self, state: &mut SymbolState) -> u32 {
        self.get_magnitude(state, false).0
    }

    fn get_magnitude(&mut self, state: &mut SymbolState, signed: bool) -> (u32, bool) {
        if self.get_bit(&mut state[0]) {
            return (0, false);
        }
        let mut e = 0usize;
        while self.get_bit(&mut state[1 + e.min(9)]) {
            e += 1;
            if e > 31 {
                self.mark_corrupt();
                return (0, false);
            }
        }
        let mut a: u32 = 1;
        for i in (0..e).rev() {
            a = a
                .wrapping_add(a)
                .wrapping_add(self.get_bit(&mut state[22 + i.min(9)]) as u32);
        }
        let negative = signed && self.get_bit(&mut state[11 + e.min(10)]);
        (a, negative)
    }
}
