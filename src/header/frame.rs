// src/header/frame.rs

//! In-band headers of the frame packet.
//!
//! Versions 0 and 1 repeat their stream parameters at the start of every key
//! frame. Version 2 key frames list the slices instead, each with its grid
//! block and quantisation tables. Both follow the key-frame bit in the
//! range coder of the first slice and share one symbol state.

use super::extradata::{read_coder, write_coder};
use super::params::{GlobalParams, MAX_SLICES};
use super::slice::SliceHeader;
use crate::coder::{RangeDecoder, RangeEncoder, SymbolState};
use crate::model::QuantTable;
use crate::slice::geometry::{GridCell, SliceGrid};
use crate::utils::error::{Ffv1Error, Result};

/// Stream parameters of a version 0 or 1 key frame.
pub fn write_keyframe_header(c: &mut RangeEncoder, state: &mut SymbolState, p: &GlobalParams) {
    c.put_unsigned(state, p.version);
    write_coder(c, state, p);
    c.put_unsigned(state, p.colorspace.to_wire());
    if p.version > 0 {
        c.put_unsigned(state, p.bits_per_raw_sample);
    }
    c.put_bit(&mut state[0], p.chroma_planes());
    c.put_unsigned(state, p.h_shift());
    c.put_unsigned(state, p.v_shift());
    c.put_bit(&mut state[0], p.transparency);
    // One table shared by every plane.
    if let Some(table) = p.quant_tables.first() {
        table.write(c);
    }
}

pub fn read_keyframe_header(
    c: &mut RangeDecoder<'_>,
    state: &mut SymbolState,
    width: u32,
    height: u32,
) -> Result<GlobalParams> {
    let version = c.get_unsigned(state);
    if version >= 2 {
        return Err(Ffv1Error::invalid(format!(
            "version {} parameters inside a frame",
            version
        )));
    }
    let (coder, state_table) = read_coder(c, state)?;
    let colorspace = c.get_unsigned(state);
    let bits = if version > 0 { c.get_unsigned(state) } else { 8 };
    let chroma_planes = c.get_bit(&mut state[0]);
    let h_shift = c.get_unsigned(state);
    let v_shift = c.get_unsigned(state);
    let transparency = c.get_bit(&mut state[0]);

    let mut p = GlobalParams::from_wire_fields(
        version,
        coder,
        state_table,
        colorspace,
        bits,
        chroma_planes,
        h_shift,
        v_shift,
        transparency,
    )?;
    p.quant_tables.push(QuantTable::read(c)?);
    p.fill_default_initial_states()?;
    if c.is_corrupt() {
        return Err(Ffv1Error::invalid("corrupt frame header"));
    }
    p.validate(width, height)?;
    Ok(p)
}

/// Slice list of a version 2 key frame.
pub fn write_slice_list(
    c: &mut RangeEncoder,
    state: &mut SymbolState,
    slices: &[SliceHeader],
) {
    c.put_unsigned(state, slices.len() as u32);
    for s in slices {
        c.put_unsigned(state, s.cell.sx as u32);
        c.put_unsigned(state, s.cell.sy as u32);
        c.put_unsigned(state, (s.cell.sw - 1) as u32);
        c.put_unsigned(state, (s.cell.sh - 1) as u32);
        for &q in &s.quant_indices {
            c.put_unsigned(state, q as u32);
        }
    }
}

pub fn read_slice_list(
    c: &mut RangeDecoder<'_>,
    state: &mut SymbolState,
    p: &GlobalParams,
    max_slices: usize,
) -> Result<Vec<SliceHeader>> {
    let grid = SliceGrid::of(p);
    let count = c.get_unsigned(state) as usize;
    if count == 0 || count > MAX_SLICES || count > grid.count() || count > max_slices {
        return Err(Ffv1Error::invalid(format!(
            "{} slices in a {}x{} grid",
            count, grid.num_h, grid.num_v
        )));
    }
    let mut slices = Vec::with_capacity(count);
    for _ in 0..count {
        let cell = GridCell {
            sx: c.get_unsigned(state) as usize,
            sy: c.get_unsigned(state) as usize,
            sw: c.get_unsigned(state) as usize + 1,
            sh: c.get_unsigned(state) as usize + 1,
        };
        grid.check(&cell)?;
        let mut header = SliceHeader::new(p, cell, 0);
        for q in header.quant_indices.iter_mut() {
            let idx = c.get_unsigned(state) as usize;
            if idx >= p.quant_tables.len() {
                return Err(Ffv1Error::invalid(format!(
                    "quantisation table {} of {}",
                    idx,
                    p.quant_tables.len()
                )));
            }
            *q = idx;
        }
        slices.push(header);
    }
    if c.is_corrupt() {
        return Err(Ffv1Error::invalid("corrupt slice list"));
    }
    Ok(slices)
}
