// src/slice/sample.rs

//! Sample storage of the slice coder.
//!
//! The prediction loop is written once against [`Sample`] and instantiated
//! for `i16` (YCbCr at any depth, RGB up to 14 bits) and `i32` (RGB at 15
//! and 16 bits, whose transformed chroma needs 17 bits).

use bytemuck::{Pod, Zeroable};

use crate::model::Neighbourhood;
use crate::utils::error::Result;

/// Integer type held in the line buffers.
pub trait Sample: Pod + Zeroable + Copy + Send + Sync + 'static {
    /// Stores `v`, wrapping to the width of the type.
    fn from_i32(v: i32) -> Self;
    fn to_i32(self) -> i32;
}

impl Sample for i16 {
    #[inline(always)]
    fn from_i32(v: i32) -> Self {
        v as i16
    }

    #[inline(always)]
    fn to_i32(self) -> i32 {
        self as i32
    }
}

impl Sample for i32 {
    #[inline(always)]
    fn from_i32(v: i32) -> Self {
        v
    }

    #[inline(always)]
    fn to_i32(self) -> i32 {
        self
    }
}

/// Left and right margin of every buffered row.
const MARGIN: usize = 3;

/// The last two or three rows of one plane of a slice.
///
/// Rows carry three samples of margin on each side. When a row becomes
/// current its left margin takes the first sample of the row above and the
/// row above is extended by its own last sample, so the neighbourhood of
/// edge samples is well defined without branches in the per-sample loop.
#[derive(Debug, Clone)]
pub struct LineRing<S: Sample> {
    buf: Vec<S>,
    width: usize,
    stride: usize,
    rows: usize,
    cur: usize,
}

impl<S: Sample> LineRing<S> {
    /// `rows` is 3 when the context uses the sample two rows up, else 2.
    pub fn new(width: usize, rows: usize) -> Result<Self> {
        let stride = width + 2 * MARGIN;
        let mut buf = Vec::new();
        buf.try_reserve_exact(stride * rows)?;
        buf.resize(stride * rows, S::zeroed());
        Ok(Self {
            buf,
            width,
            stride,
            rows,
            cur: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Forgets all rows; the rows above the first line read as zero.
    pub fn clear(&mut self) {
        self.buf.fill(S::zeroed());
        self.cur = 0;
    }

    #[inline(always)]
    fn base(&self, up: usize) -> usize {
        ((self.cur + self.rows - up) % self.rows) * self.stride + MARGIN
    }

    /// Moves to the next line and prepares the edge samples.
    pub fn advance(&mut self) {
        self.cur = (self.cur + 1) % self.rows;
        let cur = self.base(0);
        let top = self.base(1);
        self.buf[cur - 1] = self.buf[top];
        if self.width > 0 {
            self.buf[top + self.width] = self.buf[top + self.width - 1];
        }
    }

    #[inline(always)]
    pub fn neighbourhood(&self, x: usize) -> Neighbourhood {
        let c = self.base(0) + x;
        let t = self.base(1) + x;
        let tt = self.base(2) + x;
        Neighbourhood {
            left: self.buf[c - 1].to_i32(),
            left_left: self.buf[c - 2].to_i32(),
            top_left: self.buf[t - 1].to_i32(),
            top: self.buf[t].to_i32(),
            top_right: self.buf[t + 1].to_i32(),
            top_top: self.buf[tt].to_i32(),
        }
    }

    #[inline(always)]
    pub fn get(&self, x: usize) -> i32 {
        self.buf[self.base(0) + x].to_i32()
    }

    #[inline(always)]
    pub fn set(&mut self, x: usize, v: i32) {
        let i = self.base(0) + x;
        self.buf[i] = S::from_i32(v);
    }

    /// The current line, without margins.
    pub fn current(&self) -> &[S] {
        let b = self.base(0);
        &self.buf[b..b + self.width]
    }

    pub fn current_mut(&mut self) -> &mut [S] {
        let b = self.base(0);
        let w = self.width;
        &mut self.buf[b..b + w]
    }
}
