// src/header/slice.rs

//! The range-coded header at the start of every version 3 and later slice.

use super::params::GlobalParams;
use crate::coder::{RangeDecoder, RangeEncoder, fresh_symbol_state};
use crate::image::image_formats::{PictureStructure, SampleAspectRatio};
use crate::slice::geometry::{GridCell, SliceGrid};
use crate::slice::rct::RctCoefficients;
use crate::utils::error::{Ffv1Error, Result};

/// Sample-remapping symbol, present from version 4.4.
const REMAP_SINCE: u32 = 0x4_0004;

/// How the samples of a slice are coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodingMode {
    /// Predicted residuals through the context model.
    #[default]
    Normal,
    /// Raw samples, one fixed-probability decision per bit.
    Pcm,
}

impl CodingMode {
    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(CodingMode::Normal),
            1 => Ok(CodingMode::Pcm),
            _ => Err(Ffv1Error::invalid(format!("slice coding mode {}", v))),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            CodingMode::Normal => 0,
            CodingMode::Pcm => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    pub cell: GridCell,
    /// Quantisation table per plane context.
    pub quant_indices: Vec<usize>,
    pub picture_structure: PictureStructure,
    pub sample_aspect_ratio: SampleAspectRatio,
    /// Version 4: the slice starts from fresh contexts.
    pub reset_contexts: bool,
    pub coding_mode: CodingMode,
    pub rct: RctCoefficients,
}

impl SliceHeader {
    /// A normal-mode header for `cell` using table `quant_index` on every plane.
    pub fn new(p: &GlobalParams, cell: GridCell, quant_index: usize) -> Self {
        Self {
            cell,
            quant_indices: vec![quant_index; p.plane_count()],
            picture_structure: PictureStructure::Progressive,
            sample_aspect_ratio: SampleAspectRatio::default(),
            reset_contexts: false,
            coding_mode: CodingMode::Normal,
            rct: RctCoefficients::default(),
        }
    }

    pub fn write(&self, c: &mut RangeEncoder, p: &GlobalParams) {
        let mut state = fresh_symbol_state();
        c.put_unsigned(&mut state, self.cell.sx as u32);
        c.put_unsigned(&mut state, self.cell.sy as u32);
        c.put_unsigned(&mut state, (self.cell.sw - 1) as u32);
        c.put_unsigned(&mut state, (self.cell.sh - 1) as u32);
        for &q in &self.quant_indices {
            c.put_unsigned(&mut state, q as u32);
        }
        c.put_unsigned(&mut state, self.picture_structure.to_wire());
        c.put_unsigned(&mut state, self.sample_aspect_ratio.num);
        c.put_unsigned(&mut state, self.sample_aspect_ratio.den);
        if p.version > 3 {
            c.put_bit(&mut state[0], self.reset_contexts);
            c.put_unsigned(&mut state, self.coding_mode.to_wire());
            if self.coding_mode != CodingMode::Pcm && p.colorspace.is_rgb() {
                c.put_unsigned(&mut state, self.rct.by);
                c.put_unsigned(&mut state, self.rct.ry);
            }
            if p.combined_version() >= REMAP_SINCE {
                c.put_unsigned(&mut state, 0);
            }
        }
    }

    pub fn read(c: &mut RangeDecoder<'_>, p: &GlobalParams) -> Result<Self> {
        let mut state = fresh_symbol_state();
        let cell = GridCell {
            sx: c.get_unsigned(&mut state) as usize,
            sy: c.get_unsigned(&mut state) as usize,
            sw: c.get_unsigned(&mut state) as usize + 1,
            sh: c.get_unsigned(&mut state) as usize + 1,
        };
        SliceGrid::of(p).check(&cell)?;

        let mut quant_indices = Vec::with_capacity(p.plane_count());
        for _ in 0..p.plane_count() {
            let q = c.get_unsigned(&mut state) as usize;
            if q >= p.quant_tables.len() {
                return Err(Ffv1Error::invalid(format!(
                    "quantisation table {} of {}",
                    q,
                    p.quant_tables.len()
                )));
            }
            quant_indices.push(q);
        }
        let picture_structure = PictureStructure::from_wire(c.get_unsigned(&mut state));
        let num = c.get_unsigned(&mut state);
        let den = c.get_unsigned(&mut state);

        let mut header = Self {
            cell,
            quant_indices,
            picture_structure,
            sample_aspect_ratio: SampleAspectRatio::new(num, den),
            reset_contexts: false,
            coding_mode: CodingMode::Normal,
            rct: RctCoefficients::default(),
        };
        if p.version > 3 {
            header.reset_contexts = c.get_bit(&mut state[0]);
            header.coding_mode = CodingMode::from_wire(c.get_unsigned(&mut state))?;
            if header.coding_mode != CodingMode::Pcm && p.colorspace.is_rgb() {
                let by = c.get_unsigned(&mut state);
                let ry = c.get_unsigned(&mut state);
                header.rct = RctCoefficients::new(by, ry);
                if !header.rct.is_valid() {
                    return Err(Ffv1Error::invalid(format!(
                        "colour transform coefficients {}+{} exceed 4",
                        by, ry
                    )));
                }
            }
            if p.combined_version() >= REMAP_SINCE && c.get_unsigned(&mut state) != 0 {
                return Err(Ffv1Error::invalid("sample remapping without float samples"));
            }
        }
        if c.is_corrupt() {
            return Err(Ffv1Error::invalid("corrupt slice header"));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::params::tests::params;
    use crate::header::params::{ChromaLayout, Colorspace};

    fn round_trip(h: &SliceHeader, p: &GlobalParams) -> Result<SliceHeader> {
        let mut c = RangeEncoder::new(256);
        h.write(&mut c, p);
        c.terminate(true);
        let data = c.into_bytes();
        let mut d = RangeDecoder::new(&data);
        let back = SliceHeader::read(&mut d, p)?;
        assert!(d.read_sentinel());
        assert_eq!(d.bytes_consumed(), data.len());
        Ok(back)
    }

    #[test]
    fn test_version_three_header() {
        let mut p = params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        p.num_h_slices = 2;
        p.num_v_slices = 2;
        let mut h = SliceHeader::new(&p, GridCell { sx: 1, sy: 0, sw: 1, sh: 2 }, 0);
        h.picture_structure = PictureStructure::TopFieldFirst;
        h.sample_aspect_ratio = SampleAspectRatio::new(16, 11);
        assert_eq!(round_trip(&h, &p).unwrap(), h);
    }

    #[test]
    fn test_version_four_rgb_header() {
        let p = params(4, Colorspace::Rgb, 10);
        let mut h = SliceHeader::new(&p, GridCell { sx: 0, sy: 0, sw: 1, sh: 1 }, 0);
        h.rct = RctCoefficients::new(3, 1);
        assert_eq!(round_trip(&h, &p).unwrap(), h);

        h.coding_mode = CodingMode::Pcm;
        h.reset_contexts = true;
        // PCM slices carry no colour transform.
        let back = round_trip(&h, &p).unwrap();
        assert_eq!(back.coding_mode, CodingMode::Pcm);
        assert!(back.reset_contexts);
        assert_eq!(back.rct, RctCoefficients::default());
    }

    #[test]
    fn test_rejects_out_of_range_fields() {
        let p = params(4, Colorspace::Rgb, 8);
        let mut h = SliceHeader::new(&p, GridCell { sx: 0, sy: 0, sw: 1, sh: 1 }, 0);
        h.rct = RctCoefficients::new(4, 1);
        assert!(matches!(round_trip(&h, &p), Err(Ffv1Error::InvalidData(_))));

        let mut h = SliceHeader::new(&p, GridCell { sx: 0, sy: 0, sw: 1, sh: 1 }, 0);
        h.quant_indices[1] = 1;
        assert!(matches!(round_trip(&h, &p), Err(Ffv1Error::InvalidData(_))));

        let h = SliceHeader::new(&p, GridCell { sx: 1, sy: 0, sw: 1, sh: 1 }, 0);
        assert!(matches!(round_trip(&h, &p), Err(Ffv1Error::InvalidData(_))));
    }
}
