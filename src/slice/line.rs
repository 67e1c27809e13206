// src/slice/line.rs

//! Coding of one line of samples.
//!
//! Each sample is predicted from its neighbours, its residual folded into
//! the signed range of the coded bit depth and sent in the context picked by
//! the neighbour gradients. A negative context is mirrored by negating the
//! residual. The entropy back-end is a type parameter, so the per-sample
//! loop is compiled once per back-end and never branches on it.

use super::sample::{LineRing, Sample};
use crate::coder::run::{RunDecoder, RunEncoder};
use crate::coder::{BitReader, BitWriter, INITIAL_STATE, RangeDecoder, RangeEncoder, fold};
use crate::model::{PlaneContext, QuantTable};

/// Destination of the residuals of a slice.
pub trait ResidualWriter {
    fn begin_line(&mut self) {}
    /// `context` is non-negative; `diff` is already folded.
    fn put(&mut self, plane: &mut PlaneContext, context: usize, diff: i32, bits: u32);
    fn end_line(&mut self) {}
}

/// Source of the residuals of a slice.
pub trait ResidualReader {
    fn begin_line(&mut self) {}
    fn get(&mut self, plane: &mut PlaneContext, context: usize, x: usize, width: usize, bits: u32) -> i32;
}

pub struct RangeResiduals<'a> {
    pub c: &'a mut RangeEncoder,
}

impl ResidualWriter for RangeResiduals<'_> {
    #[inline]
    fn put(&mut self, plane: &mut PlaneContext, context: usize, diff: i32, _bits: u32) {
        self.c.put_symbol(&mut plane.states[context], diff, true);
    }
}

pub struct GolombResiduals<'a> {
    pub w: &'a mut BitWriter,
    pub run: &'a mut RunEncoder,
}

impl ResidualWriter for GolombResiduals<'_> {
    fn begin_line(&mut self) {
        self.run.begin_line();
    }

    #[inline]
    fn put(&mut self, plane: &mut PlaneContext, context: usize, diff: i32, bits: u32) {
        self.run
            .put(self.w, &mut plane.vlc[context], context == 0, diff, bits);
    }

    fn end_line(&mut self) {
        self.run.end_line(self.w);
    }
}

pub struct RangeResidualSource<'a, 'b> {
    pub c: &'a mut RangeDecoder<'b>,
}

impl ResidualReader for RangeResidualSource<'_, '_> {
    #[inline]
    fn get(&mut self, plane: &mut PlaneContext, context: usize, _x: usize, _width: usize, _bits: u32) -> i32 {
        self.c.get_symbol(&mut plane.states[context], true)
    }
}

pub struct GolombResidualSource<'a, 'b> {
    pub r: &'a mut BitReader<'b>,
    pub run: &'a mut RunDecoder,
}

impl ResidualReader for GolombResidualSource<'_, '_> {
    fn begin_line(&mut self) {
        self.run.begin_line();
    }

    #[inline]
    fn get(&mut self, plane: &mut PlaneContext, context: usize, x: usize, width: usize, bits: u32) -> i32 {
        self.run
            .get(self.r, &mut plane.vlc[context], context == 0, x, width, bits)
    }
}

/// Codes the current line of `ring`.
pub fn encode_line<S: Sample, W: ResidualWriter>(
    w: &mut W,
    plane: &mut PlaneContext,
    q: &QuantTable,
    ring: &LineRing<S>,
    bits: u32,
) {
    let far = q.uses_far_neighbours();
    w.begin_line();
    for x in 0..ring.width() {
        let n = ring.neighbourhood(x);
        let context = n.context(q, far);
        let mut diff = ring.get(x).wrapping_sub(n.predict());
        if context < 0 {
            diff = diff.wrapping_neg();
        }
        w.put(plane, context.unsigned_abs() as usize, fold(diff, bits), bits);
    }
    w.end_line();
}

/// Decodes into the current line of `ring`, masking samples to `bits`.
pub fn decode_line<S: Sample, R: ResidualReader>(
    r: &mut R,
    plane: &mut PlaneContext,
    q: &QuantTable,
    ring: &mut LineRing<S>,
    bits: u32,
) {
    let far = q.uses_far_neighbours();
    let mask = ((1u64 << bits) - 1) as i32;
    let width = ring.width();
    r.begin_line();
    for x in 0..width {
        let n = ring.neighbourhood(x);
        let context = n.context(q, far);
        let mut diff = r.get(plane, context.unsigned_abs() as usize, x, width, bits);
        if context < 0 {
            diff = diff.wrapping_neg();
        }
        ring.set(x, n.predict().wrapping_add(diff) & mask);
    }
}

/// Raw samples, most significant bit first, each bit on a fresh state.
pub fn encode_pcm_line<S: Sample>(c: &mut RangeEncoder, ring: &LineRing<S>, bits: u32) {
    for x in 0..ring.width() {
        let v = ring.get(x);
        for i in (0..bits).rev() {
            let mut state = INITIAL_STATE;
            c.put_bit(&mut state, (v >> i) & 1 != 0);
        }
    }
}

pub fn decode_pcm_line<S: Sample>(c: &mut RangeDecoder<'_>, ring: &mut LineRing<S>, bits: u32) {
    for x in 0..ring.width() {
        let mut v = 0i32;
        for _ in 0..bits {
            let mut state = INITIAL_STATE;
            v = (v << 1) | c.get_bit(&mut state) as i32;
        }
        ring.set(x, v);
    }
}
