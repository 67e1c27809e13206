// src/model/quant.rs

//! Quantisation tables mapping neighbour gradients to a context index.
//!
//! A [`QuantTable`] holds five 256-entry input tables. Each is indexed by a
//! gradient reduced to 8 bits and already scaled by the product of the level
//! counts of the inputs before it, so a context is the plain sum of five
//! lookups. Tables are odd-symmetric (`q[-d] == -q[d]`), which lets the coder
//! fold a context and its negation into one adaptive state.

use crate::coder::{RangeDecoder, RangeEncoder, fresh_symbol_state};
use crate::utils::error::{Ffv1Error, Result};

pub const MAX_CONTEXT_INPUTS: usize = 5;
/// Largest raw context product a transmitted table set may describe.
pub const MAX_CONTEXT_PRODUCT: u32 = 32_768;
pub const MAX_QUANT_TABLES: usize = 8;

/// Level boundaries on the positive half of the built-in tables: level `n`
/// covers gradients `ends[n-1]..ends[n]`.
const QUANT11_ENDS: [usize; 6] = [1, 2, 5, 12, 35, 128];
const QUANT5_ENDS: [usize; 3] = [1, 4, 128];
const QUANT9_10BIT_ENDS: [usize; 5] = [5, 13, 27, 56, 128];
const QUANT5_10BIT_ENDS: [usize; 3] = [11, 50, 128];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    pub inputs: [[i16; 256]; MAX_CONTEXT_INPUTS],
    pub context_count: usize,
}

/// Builds one odd-symmetric input table with every level multiplied by `scale`.
fn symmetric_table(ends: &[usize], scale: i16) -> [i16; 256] {
    let mut q = [0i16; 256];
    let mut level = 0usize;
    for (i, slot) in q.iter_mut().enumerate().take(128) {
        while i >= ends[level] {
            level += 1;
        }
        *slot = level as i16 * scale;
    }
    mirror(&mut q);
    q
}

fn mirror(q: &mut [i16; 256]) {
    for i in 1..128 {
        q[256 - i] = -q[i];
    }
    q[128] = -q[127];
}

impl QuantTable {
    /// Context model 0: three inputs (left, top-left, top gradients).
    pub fn small(high_bit_depth: bool) -> Self {
        let (base, k) = if high_bit_depth {
            (&QUANT9_10BIT_ENDS[..], 9i16)
        } else {
            (&QUANT11_ENDS[..], 11i16)
        };
        let zero = [0i16; 256];
        let inputs = [
            symmetric_table(base, 1),
            symmetric_table(base, k),
            symmetric_table(base, k * k),
            zero,
            zero,
        ];
        let product = (k as usize).pow(3);
        Self {
            inputs,
            context_count: product.div_ceil(2),
        }
    }

    /// Context model 1: five inputs, adding the two-away neighbours.
    pub fn large(high_bit_depth: bool) -> Self {
        let (base, fine, k) = if high_bit_depth {
            (&QUANT9_10BIT_ENDS[..], &QUANT5_10BIT_ENDS[..], 9i16)
        } else {
            (&QUANT11_ENDS[..], &QUANT5_ENDS[..], 11i16)
        };
        let inputs = [
            symmetric_table(base, 1),
            symmetric_table(base, k),
            symmetric_table(fine, k * k),
            symmetric_table(fine, 5 * k * k),
            symmetric_table(fine, 25 * k * k),
        ];
        let product = (k as usize).pow(2) * 125;
        Self {
            inputs,
            context_count: product.div_ceil(2),
        }
    }

    /// Built-in table for a context model index (0 or 1).
    pub fn for_model(model: u32, bits_per_sample: u32) -> Self {
        let high = bits_per_sample > 8;
        if model == 0 {
            Self::small(high)
        } else {
            Self::large(high)
        }
    }

    /// True when the two-away inputs contribute to the context.
    #[inline]
    pub fn uses_far_neighbours(&self) -> bool {
        self.inputs[3][127] != 0 || self.inputs[4][127] != 0
    }

    /// Writes all five inputs as run lengths of equal levels.
    pub fn write(&self, c: &mut RangeEncoder) {
        for table in &self.inputs {
            write_input_table(c, table);
        }
    }

    /// Reads five inputs; each input's levels are scaled by the product of the
    /// level counts read before it.
    pub fn read(c: &mut RangeDecoder<'_>) -> Result<Self> {
        let mut inputs = [[0i16; 256]; MAX_CONTEXT_INPUTS];
        let mut product: u32 = 1;
        for table in inputs.iter_mut() {
            let levels = read_input_table(c, table, product)?;
            product = product.saturating_mul(levels);
            if product > MAX_CONTEXT_PRODUCT {
                return Err(Ffv1Error::invalid(format!(
                    "quantisation tables describe {} contexts",
                    product
                )));
            }
        }
        Ok(Self {
            inputs,
            context_count: (product as usize).div_ceil(2),
        })
    }
}

fn write_input_table(c: &mut RangeEncoder, table: &[i16; 256]) {
    let mut state = fresh_symbol_state();
    let mut last = 0usize;
    for i in 1..128 {
        if table[i] != table[i - 1] {
            c.put_unsigned(&mut state, (i - last - 1) as u32);
            last = i;
        }
    }
    c.put_unsigned(&mut state, (128 - last - 1) as u32);
}

/// Returns the number of levels of the symmetric table (`2v - 1`).
fn read_input_table(c: &mut RangeDecoder<'_>, table: &mut [i16; 256], scale: u32) -> Result<u32> {
    let mut state = fresh_symbol_state();
    let mut i = 0usize;
    let mut v: u32 = 0;
    while i < 128 {
        let len = c.get_unsigned(&mut state) as usize + 1;
        if c.is_corrupt() || len > 128 - i {
            return Err(Ffv1Error::invalid("quantisation table run overflows"));
        }
        let value = scale as i64 * v as i64;
        if value > i16::MAX as i64 {
            return Err(Ffv1Error::invalid("quantisation level out of range"));
        }
        for slot in &mut table[i..i + len] {
            *slot = value as i16;
        }
        i += len;
        v += 1;
    }
    mirror(table);
    Ok(2 * v - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_context_counts() {
        assert_eq!(QuantTable::small(false).context_count, 666);
        assert_eq!(QuantTable::large(false).context_count, 7563);
        assert_eq!(QuantTable::small(true).context_count, 365);
        assert_eq!(QuantTable::large(true).context_count, 5063);
    }

    #[test]
    fn test_tables_are_odd_symmetric() {
        for t in [QuantTable::small(false), QuantTable::large(true)] {
            for q in &t.inputs {
                for d in 1..128 {
                    assert_eq!(q[256 - d], -q[d]);
                }
                assert_eq!(q[128], -q[127]);
                assert_eq!(q[0], 0);
            }
        }
    }

    #[test]
    fn test_known_levels() {
        let t = QuantTable::small(false);
        let q11 = &t.inputs[0];
        assert_eq!(&q11[..13], &[0, 1, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 4]);
        assert_eq!(q11[34], 4);
        assert_eq!(q11[35], 5);
        assert_eq!(q11[255], -1);
        assert_eq!(t.inputs[2][127], 5 * 121);
        assert!(!t.uses_far_neighbours());
        assert!(QuantTable::large(false).uses_far_neighbours());
    }

    #[test]
    fn test_tables_survive_the_wire() {
        for model in 0..2 {
            for bits in [8, 10] {
                let t = QuantTable::for_model(model, bits);
                let mut enc = RangeEncoder::new(1024);
                t.write(&mut enc);
                enc.terminate(false);
                let data = enc.into_bytes();

                let mut dec = RangeDecoder::new(&data);
                let back = QuantTable::read(&mut dec).unwrap();
                assert_eq!(back, t);
            }
        }
    }

    #[test]
    fn test_oversized_product_is_rejected() {
        // Five inputs of 11 levels each describe 161051 contexts.
        let mut inputs = [[0i16; 256]; MAX_CONTEXT_INPUTS];
        for q in inputs.iter_mut() {
            *q = symmetric_table(&QUANT11_ENDS, 1);
        }
        let t = QuantTable {
            inputs,
            context_count: 0,
        };
        let mut enc = RangeEncoder::new(1024);
        t.write(&mut enc);
        enc.terminate(false);
        let data = enc.into_bytes();
        let mut dec = RangeDecoder::new(&data);
        assert!(matches!(
            QuantTable::read(&mut dec),
            Err(Ffv1Error::InvalidData(_))
        ));
    }
}
