// src/coder/states.rs

//! Probability-state transition tables for the range coder.
//!
//! Every adaptive decision is coded against an 8-bit state `s`, read as the
//! probability `s / 256` of a one. After the decision the state moves through
//! `one_state[s]` or `zero_state[s]`. The default tables are derived from a
//! geometric adaptation curve; a stream may instead carry its own one-state
//! table as deltas against the default.

use crate::utils::error::{Ffv1Error, Result};

/// Adaptation factor of the default table, `0.05 * 2^32`.
pub const DEFAULT_FACTOR: u64 = 214_748_364;
/// Highest probability state of the default table (`256 - 8`).
pub const DEFAULT_MAX_P: u32 = 248;

/// One-state table used by coder type 2 ("custom table") when the encoder
/// does not compute its own.
pub const VERSION2_STATE: [u8; 256] = [
    0, 10, 10, 10, 10, 16, 16, 16, 28, 16, 16, 29, 42, 49, 20, 49,
    59, 25, 26, 26, 27, 31, 33, 33, 33, 34, 34, 37, 67, 38, 39, 39,
    40, 40, 41, 79, 43, 44, 45, 45, 48, 48, 64, 50, 51, 52, 88, 52,
    53, 74, 55, 57, 58, 58, 74, 60, 101, 61, 62, 84, 66, 66, 68, 69,
    87, 82, 71, 97, 73, 73, 82, 75, 111, 77, 94, 78, 87, 81, 83, 97,
    85, 83, 94, 86, 99, 89, 90, 99, 111, 92, 93, 134, 95, 98, 105, 98,
    105, 110, 102, 108, 102, 118, 103, 106, 106, 113, 109, 112, 114, 112, 116, 125,
    115, 116, 117, 117, 126, 119, 125, 121, 121, 123, 145, 124, 126, 131, 127, 129,
    165, 130, 132, 138, 133, 135, 145, 136, 137, 139, 146, 141, 143, 142, 144, 148,
    147, 155, 151, 149, 151, 150, 152, 157, 153, 154, 156, 168, 158, 162, 161, 160,
    172, 163, 169, 164, 166, 184, 167, 170, 177, 174, 171, 173, 182, 176, 180, 178,
    175, 189, 179, 181, 186, 183, 192, 185, 200, 187, 191, 188, 190, 197, 193, 196,
    197, 194, 195, 196, 198, 202, 199, 201, 210, 203, 207, 204, 205, 206, 208, 214,
    209, 211, 221, 212, 213, 215, 224, 216, 217, 218, 219, 220, 222, 228, 223, 225,
    226, 224, 227, 229, 240, 230, 231, 232, 233, 234, 235, 236, 238, 239, 237, 242,
    241, 243, 242, 244, 245, 246, 247, 248, 249, 250, 251, 252, 252, 253, 254, 255,
];

/// The pair of transition tables shared by a range encoder/decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransitions {
    pub zero_state: [u8; 256],
    pub one_state: [u8; 256],
}

impl Default for StateTransitions {
    fn default() -> Self {
        Self::build(DEFAULT_FACTOR, DEFAULT_MAX_P)
    }
}

impl StateTransitions {
    /// Derives both tables from the adaptation curve `p' = p + (1 - p) * factor`.
    ///
    /// Deterministic in `(factor, max_p)`; `factor` is a 32-bit fixed-point
    /// fraction and `max_p` the highest reachable state.
    pub fn build(factor: u64, max_p: u32) -> Self {
        const ONE: u64 = 1 << 32;
        let mut zero_state = [0u8; 256];
        let mut one_state = [0u8; 256];

        let mut last_p8: u32 = 0;
        let mut p = ONE / 2;
        for _ in 0..128 {
            let mut p8 = ((256 * p + ONE / 2) >> 32) as u32;
            if p8 <= last_p8 {
                p8 = last_p8 + 1;
            }
            if last_p8 != 0 && last_p8 < 256 && p8 <= max_p {
                one_state[last_p8 as usize] = p8 as u8;
            }
            p += ((ONE - p) * factor + ONE / 2) >> 32;
            last_p8 = p8;
        }

        for i in (256 - max_p)..=max_p {
            if one_state[i as usize] != 0 {
                continue;
            }
            let mut p = (i as u64 * ONE + 128) >> 8;
            p += ((ONE - p) * factor + ONE / 2) >> 32;
            let mut p8 = ((256 * p + ONE / 2) >> 32) as u32;
            if p8 <= i {
                p8 = i + 1;
            }
            if p8 > max_p {
                p8 = max_p;
            }
            one_state[i as usize] = p8 as u8;
        }

        for i in 1..255 {
            zero_state[i] = (256 - one_state[256 - i] as u32) as u8;
        }

        Self {
            zero_state,
            one_state,
        }
    }

    /// Installs a transmitted one-state table; zero states mirror it.
    pub fn with_one_states(table: &[u8; 256]) -> Self {
        let mut t = Self::default();
        t.apply_one_states(table);
        t
    }

    pub fn apply_one_states(&mut self, table: &[u8; 256]) {
        for i in 1..256 {
            self.one_state[i] = table[i];
            self.zero_state[256 - i] = (256 - table[i] as u32) as u8;
        }
    }

    /// Signed deltas `table[i] - default_one[i]` for `i in 1..256`, as sent on the wire.
    pub fn deltas_against_default(table: &[u8; 256]) -> Vec<i32> {
        let default = Self::default();
        (1..256)
            .map(|i| table[i] as i32 - default.one_state[i] as i32)
            .collect()
    }

    /// Rebuilds a one-state table from wire deltas, rejecting states outside 1..=255.
    pub fn table_from_deltas(deltas: &[i32]) -> Result<[u8; 256]> {
        if deltas.len() != 255 {
            return Err(Ffv1Error::invalid(format!(
                "state transition table needs 255 entries, got {}",
                deltas.len()
            )));
        }
        let default = Self::default();
        let mut table = [0u8; 256];
        for (i, delta) in deltas.iter().enumerate() {
            let st = default.one_state[i + 1] as i64 + *delta as i64;
            if !(1..=255).contains(&st) {
                return Err(Ffv1Error::invalid(format!(
                    "state transition {} out of range: {}",
                    i + 1,
                    st
                )));
            }
            table[i + 1] = st as u8;
        }
        Ok(table)
    }
}
