// src/slice/geometry.rs

//! Slice grid layout.
//!
//! A frame is cut into `num_h x num_v` cells. Cell `(sx, sy)` spans columns
//! `sx * width / num_h .. (sx + 1) * width / num_h` (rows likewise), so the
//! cells tile the frame whatever its size. Slice `i` of a frame is cell
//! `(i % num_h, i / num_h)`; a slice header may name a block of several cells.

use crate::header::params::{GlobalParams, MAX_SLICES};
use crate::image::geom::Rect;
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::debug;

/// Per-slice sample budget used when picking a grid automatically.
const MAX_SLICE_BITS: u64 = 8 << 24;
/// Above this many luma samples per slice a grid is only used on request.
const PREFERRED_SLICE_AREA: usize = 360 * 288;
const MAX_GRID_ROWS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceGrid {
    pub num_h: usize,
    pub num_v: usize,
}

/// A block of grid cells, as carried by the slice headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub sx: usize,
    pub sy: usize,
    pub sw: usize,
    pub sh: usize,
}

impl SliceGrid {
    pub fn new(num_h: usize, num_v: usize) -> Self {
        Self { num_h, num_v }
    }

    pub fn of(p: &GlobalParams) -> Self {
        Self::new(p.num_h_slices, p.num_v_slices)
    }

    pub fn count(&self) -> usize {
        self.num_h * self.num_v
    }

    /// The single cell slice `index` covers by default.
    pub fn cell(&self, index: usize) -> GridCell {
        GridCell {
            sx: index % self.num_h,
            sy: index / self.num_h,
            sw: 1,
            sh: 1,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.count()).map(|i| self.cell(i))
    }

    /// Rejects blocks reaching outside the grid.
    pub fn check(&self, cell: &GridCell) -> Result<()> {
        if cell.sw == 0
            || cell.sh == 0
            || cell.sx >= self.num_h
            || cell.sy >= self.num_v
            || cell.sw > self.num_h - cell.sx
            || cell.sh > self.num_v - cell.sy
        {
            return Err(Ffv1Error::invalid(format!(
                "slice block {:?} outside the {}x{} grid",
                cell, self.num_h, self.num_v
            )));
        }
        Ok(())
    }

    /// Luma rectangle of a block in a `width x height` frame.
    pub fn rect(&self, cell: &GridCell, width: usize, height: usize) -> Rect {
        let x = cell.sx * width / self.num_h;
        let y = cell.sy * height / self.num_v;
        let x_end = (cell.sx + cell.sw) * width / self.num_h;
        let y_end = (cell.sy + cell.sh) * height / self.num_v;
        Rect::new(x, y, x_end - x, y_end - y)
    }

    pub fn rects(&self, width: usize, height: usize) -> Vec<Rect> {
        self.cells().map(|c| self.rect(&c, width, height)).collect()
    }

    /// True when every inner boundary falls on a chroma sample.
    fn chroma_aligned(&self, width: usize, height: usize, h_shift: u32, v_shift: u32) -> bool {
        let h_mask = (1usize << h_shift) - 1;
        let v_mask = (1usize << v_shift) - 1;
        (1..self.num_h).all(|i| (i * width / self.num_h) & h_mask == 0)
            && (1..self.num_v).all(|i| (i * height / self.num_v) & v_mask == 0)
    }
}

/// Picks a slice grid for an encoder.
///
/// `requested == 0` selects automatically. Rows are searched upward from one
/// (two for large frames or automatic selection) and columns from the row
/// count up to twice it; grids with more slices than chroma samples, with
/// slices over the sample budget, or (before version 4) with boundaries that
/// split chroma samples are skipped.
pub fn choose_grid(p: &GlobalParams, width: usize, height: usize, requested: usize) -> Result<SliceGrid> {
    let h_shift = p.h_shift();
    let v_shift = p.v_shift();
    let max_h = (width + (1 << h_shift) - 1) >> h_shift;
    let max_v = (height + (1 << v_shift) - 1) >> v_shift;
    let planes = 1 + 2 * p.chroma_planes() as u64 + p.transparency as u64;

    let start = if width > 352 || height > 288 || requested == 0 { 2 } else { 1 };
    for num_v in start.min(max_v)..=MAX_GRID_ROWS {
        for num_h in num_v..=2 * num_v {
            if num_h > max_h || num_v > max_v {
                continue;
            }
            let max_w = width.div_ceil(num_h);
            let max_ht = height.div_ceil(num_v);
            if (max_w * max_ht) as u64 * (p.bits_per_raw_sample as u64 + 1) * planes > MAX_SLICE_BITS {
                continue;
            }
            let grid = SliceGrid::new(num_h, num_v);
            if p.version < 4 && !grid.chroma_aligned(width, height, h_shift, v_shift) {
                continue;
            }
            if requested == grid.count() && requested <= MAX_SLICES {
                debug!("slice grid {}x{} as requested", num_h, num_v);
                return Ok(grid);
            }
            if max_w * max_ht > PREFERRED_SLICE_AREA {
                continue;
            }
            if requested == 0 {
                debug!("slice grid {}x{} chosen for {}x{}", num_h, num_v, width, height);
                return Ok(grid);
            }
        }
    }
    if requested == 0 || requested == 1 {
        // Frames too narrow for any multi-slice grid.
        return Ok(SliceGrid::new(1, 1));
    }
    Err(Ffv1Error::InvalidArg(format!(
        "cannot cut a {}x{} frame into {} slices",
        width, height, requested
    )))
}
