// src/coder/run.rs

//! Run mode of the Golomb-Rice path.
//!
//! When a sample falls in context 0 (flat neighbourhood) the coder switches
//! to counting zero residuals. A run is sent as a sequence of `1` bits, each
//! covering `1 << LOG2_RUN[run_index]` samples and growing the index, then a
//! `0` bit with the remainder. The index shrinks by one after every broken
//! run, so it tracks how long runs tend to be in the current plane.

use super::golomb::{BitReader, BitWriter, VlcState};

pub const LOG2_RUN: [u8; 41] = [
    0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 9, 10, 11, 12, 13,
    14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
];

#[inline]
fn run_len(run_index: usize) -> i32 {
    1 << LOG2_RUN[run_index.min(LOG2_RUN.len() - 1)]
}

/// Encoder side: `run_index` persists across lines, mode and count do not.
#[derive(Debug, Clone, Default)]
pub struct RunEncoder {
    pub run_index: usize,
    run_count: i32,
    run_mode: bool,
}

impl RunEncoder {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn begin_line(&mut self) {
        self.run_count = 0;
        self.run_mode = false;
    }

    fn flush_full_runs(&mut self, w: &mut BitWriter) {
        while self.run_count >= run_len(self.run_index) {
            self.run_count -= run_len(self.run_index);
            if self.run_index < LOG2_RUN.len() - 1 {
                self.run_index += 1;
            }
            w.put_bit(true);
        }
    }

    /// Codes the residual of one sample; `diff` is already folded.
    pub fn put(
        &mut self,
        w: &mut BitWriter,
        vlc: &mut VlcState,
        context_is_zero: bool,
        mut diff: i32,
        bits: u32,
    ) {
        if context_is_zero {
            self.run_mode = true;
        }
        if self.run_mode {
            if diff != 0 {
                self.flush_full_runs(w);
                let log2 = LOG2_RUN[self.run_index] as u32;
                w.put_bits(1 + log2, self.run_count as u32);
                self.run_index = self.run_index.saturating_sub(1);
                self.run_count = 0;
                self.run_mode = false;
                if diff > 0 {
                    diff -= 1;
                }
            } else {
                self.run_count += 1;
            }
        }
        if !self.run_mode {
            w.put_vlc_symbol(vlc, diff, bits);
        }
    }

    /// Closes a run still open at the end of a line.
    pub fn end_line(&mut self, w: &mut BitWriter) {
        if self.run_mode {
            self.flush_full_runs(w);
            if self.run_count > 0 {
                w.put_bit(true);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunDecoder {
    pub run_index: usize,
    run_count: i32,
    // 0: off, 1: counting, 2: run ends with a coded residual
    run_mode: u8,
}

impl RunDecoder {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn begin_line(&mut self) {
        self.run_count = 0;
        self.run_mode = 0;
    }

    /// Reads the residual of sample `x` of a `width`-wide line.
    pub fn get(
        &mut self,
        r: &mut BitReader<'_>,
        vlc: &mut VlcState,
        context_is_zero: bool,
        x: usize,
        width: usize,
        bits: u32,
    ) -> i32 {
        if context_is_zero && self.run_mode == 0 {
            self.run_mode = 1;
        }
        if self.run_mode == 0 {
            return r.get_vlc_symbol(vlc, bits);
        }

        if self.run_count == 0 && self.run_mode == 1 {
            if r.get_bit() {
                self.run_count = run_len(self.run_index);
                if x + self.run_count as usize <= width && self.run_index < LOG2_RUN.len() - 1 {
                    self.run_index += 1;
                }
            } else {
                let log2 = LOG2_RUN[self.run_index] as u32;
                self.run_count = if log2 > 0 { r.get_bits(log2) as i32 } else { 0 };
                self.run_index = self.run_index.saturating_sub(1);
                self.run_mode = 2;
            }
        }

        self.run_count -= 1;
        if self.run_count < 0 {
            self.run_mode = 0;
            self.run_count = 0;
            let diff = r.get_vlc_symbol(vlc, bits);
            if diff >= 0 { diff + 1 } else { diff }
        } else {
            0
        }
    }
}
