// src/header/params.rs

//! Stream-wide parameters shared by the header readers/writers, the slice
//! codec and the orchestrators.

use crate::coder::{StateTransitions, SymbolState, fresh_symbol_state};
use crate::model::QuantTable;
use crate::utils::crc32::CrcParams;
use crate::utils::error::{Ffv1Error, Result};

/// Highest bitstream version implemented.
pub const MAX_VERSION: u32 = 4;
/// Upper bound on slices per frame.
pub const MAX_SLICES: usize = 256;

/// Entropy coder selected for slice data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coder {
    /// Adaptive Golomb-Rice codes with run mode (coder type 0).
    GolombRice,
    /// Range coder with the default transition table (coder type 1).
    Range,
    /// Range coder with a transmitted transition table (coder type 2).
    RangeCustom,
}

impl Coder {
    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(Coder::GolombRice),
            1 => Ok(Coder::Range),
            2 => Ok(Coder::RangeCustom),
            _ => Err(Ffv1Error::invalid(format!("coder type {} is not defined", v))),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            Coder::GolombRice => 0,
            Coder::Range => 1,
            Coder::RangeCustom => 2,
        }
    }

    #[inline]
    pub fn is_range(self) -> bool {
        self != Coder::GolombRice
    }
}

/// Per-slice integrity protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCheck {
    #[default]
    None,
    /// CRC-32 trailer on every slice and on the global header.
    Crc,
    /// As `Crc`, with a seeded register so all-zero data does not check to zero.
    SeededCrc,
}

impl ErrorCheck {
    pub fn from_wire(v: u32) -> Result<Self> {
        match v {
            0 => Ok(ErrorCheck::None),
            1 => Ok(ErrorCheck::Crc),
            2 => Ok(ErrorCheck::SeededCrc),
            _ => Err(Ffv1Error::unsupported(format!("error check mode {}", v))),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            ErrorCheck::None => 0,
            ErrorCheck::Crc => 1,
            ErrorCheck::SeededCrc => 2,
        }
    }

    pub fn enabled(self) -> bool {
        self != ErrorCheck::None
    }

    pub fn crc(self) -> CrcParams {
        CrcParams::for_mode(self.to_wire())
    }
}

/// Chroma arrangement of a YCbCr stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChromaLayout {
    /// False for grayscale (luma and optional alpha only).
    pub chroma_planes: bool,
    /// log2 horizontal subsampling of Cb/Cr.
    pub h_shift: u32,
    /// log2 vertical subsampling of Cb/Cr.
    pub v_shift: u32,
}

impl ChromaLayout {
    pub const GRAY: ChromaLayout = ChromaLayout {
        chroma_planes: false,
        h_shift: 0,
        v_shift: 0,
    };
    pub const YUV444: ChromaLayout = ChromaLayout::subsampled(0, 0);
    pub const YUV422: ChromaLayout = ChromaLayout::subsampled(1, 0);
    pub const YUV420: ChromaLayout = ChromaLayout::subsampled(1, 1);

    pub const fn subsampled(h_shift: u32, v_shift: u32) -> Self {
        ChromaLayout {
            chroma_planes: true,
            h_shift,
            v_shift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colorspace {
    YCbCr(ChromaLayout),
    /// Planar G, B, R coded through a per-slice reversible colour transform.
    Rgb,
}

impl Colorspace {
    pub fn to_wire(self) -> u32 {
        match self {
            Colorspace::YCbCr(_) => 0,
            Colorspace::Rgb => 1,
        }
    }

    pub fn is_rgb(self) -> bool {
        matches!(self, Colorspace::Rgb)
    }

    /// Chroma layout as carried on the wire; RGB always reports full-resolution planes.
    pub fn layout(self) -> ChromaLayout {
        match self {
            Colorspace::YCbCr(layout) => layout,
            Colorspace::Rgb => ChromaLayout::YUV444,
        }
    }

    fn from_wire(cs: u32, layout: ChromaLayout) -> Result<Self> {
        match cs {
            0 => Ok(Colorspace::YCbCr(layout)),
            1 if layout == ChromaLayout::YUV444 => Ok(Colorspace::Rgb),
            1 => Err(Ffv1Error::unsupported(format!(
                "RGB with chroma layout {:?}",
                layout
            ))),
            _ => Err(Ffv1Error::unsupported(format!("colorspace {}", cs))),
        }
    }
}

/// Everything a decoder must know before the first slice: negotiated in the
/// extradata (version 2 and up) or in each key frame (versions 0 and 1).
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalParams {
    pub version: u32,
    pub micro_version: u32,
    pub coder: Coder,
    /// One-state table for coder type 2.
    pub state_table: Option<[u8; 256]>,
    pub colorspace: Colorspace,
    pub bits_per_raw_sample: u32,
    pub transparency: bool,
    pub num_h_slices: usize,
    pub num_v_slices: usize,
    pub quant_tables: Vec<QuantTable>,
    /// Initial context states per quantisation table.
    pub initial_states: Vec<Vec<SymbolState>>,
    pub error_check: ErrorCheck,
    pub intra: bool,
}

impl GlobalParams {
    /// Fields as read from the wire, before quantisation tables are attached.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_wire_fields(
        version: u32,
        coder: Coder,
        state_table: Option<[u8; 256]>,
        colorspace: u32,
        bits: u32,
        chroma_planes: bool,
        h_shift: u32,
        v_shift: u32,
        transparency: bool,
    ) -> Result<Self> {
        let layout = ChromaLayout {
            chroma_planes,
            h_shift,
            v_shift,
        };
        Ok(Self {
            version,
            micro_version: 0,
            coder,
            state_table,
            colorspace: Colorspace::from_wire(colorspace, layout)?,
            bits_per_raw_sample: if bits == 0 { 8 } else { bits },
            transparency,
            num_h_slices: 1,
            num_v_slices: 1,
            quant_tables: Vec::new(),
            initial_states: Vec::new(),
            error_check: ErrorCheck::None,
            intra: false,
        })
    }

    /// `version << 16 | micro_version`, used for feature gates.
    pub fn combined_version(&self) -> u32 {
        (self.version << 16) | self.micro_version
    }

    /// Transition tables negotiated for slice data.
    pub fn transitions(&self) -> StateTransitions {
        match &self.state_table {
            Some(table) if self.coder == Coder::RangeCustom => {
                StateTransitions::with_one_states(table)
            }
            _ => StateTransitions::default(),
        }
    }

    pub fn chroma_planes(&self) -> bool {
        self.colorspace.layout().chroma_planes
    }

    pub fn h_shift(&self) -> u32 {
        self.colorspace.layout().h_shift
    }

    pub fn v_shift(&self) -> u32 {
        self.colorspace.layout().v_shift
    }

    /// Number of distinct plane contexts (luma, chroma, alpha) a slice keeps.
    pub fn plane_count(&self) -> usize {
        1 + (self.chroma_planes() || self.version < 4) as usize + self.transparency as usize
    }

    pub fn slice_count(&self) -> usize {
        self.num_h_slices * self.num_v_slices
    }

    /// True when slices end with a sentinel decision and carry a size trailer.
    pub fn has_slice_trailers(&self) -> bool {
        self.version > 2
    }

    /// Whether a Golomb-Rice slice ends its range-coded header with a sentinel.
    pub fn golomb_header_sentinel(&self) -> bool {
        self.version > 3 || (self.version == 3 && self.micro_version > 1)
    }

    /// Builds the per-table initial states, filling absent tables with neutral ones.
    pub fn fill_default_initial_states(&mut self) -> Result<()> {
        while self.initial_states.len() < self.quant_tables.len() {
            let count = self.quant_tables[self.initial_states.len()].context_count;
            let mut states = Vec::new();
            states.try_reserve_exact(count)?;
            states.resize(count, fresh_symbol_state());
            self.initial_states.push(states);
        }
        Ok(())
    }

    /// Checks the pixel format against what the slice codec implements.
    pub fn check_pixel_format(&self) -> Result<()> {
        let bits = self.bits_per_raw_sample;
        match self.colorspace {
            Colorspace::YCbCr(layout) => {
                if !(8..=16).contains(&bits) {
                    return Err(Ffv1Error::unsupported(format!("{}-bit YCbCr", bits)));
                }
                if layout.h_shift > 4 || layout.v_shift > 4 {
                    return Err(Ffv1Error::invalid(format!(
                        "chroma shift {}x{} out of range",
                        layout.h_shift, layout.v_shift
                    )));
                }
                if !layout.chroma_planes {
                    return Ok(());
                }
                let supported: &[(u32, u32)] = if bits <= 8 {
                    &[(0, 0), (1, 0), (1, 1), (2, 0), (2, 2), (0, 1)]
                } else {
                    &[(0, 0), (1, 0), (1, 1)]
                };
                if !supported.contains(&(layout.h_shift, layout.v_shift)) {
                    return Err(Ffv1Error::unsupported(format!(
                        "chroma subsampling {}x{} at {} bits",
                        layout.h_shift, layout.v_shift, bits
                    )));
                }
                Ok(())
            }
            Colorspace::Rgb => {
                if !(8..=16).contains(&bits) {
                    return Err(Ffv1Error::unsupported(format!("{}-bit RGB", bits)));
                }
                Ok(())
            }
        }
    }

    /// Stream-level validation against the frame size.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if self.version > MAX_VERSION {
            return Err(Ffv1Error::unsupported(format!("version {}", self.version)));
        }
        self.check_pixel_format()?;
        if self.num_h_slices == 0
            || self.num_v_slices == 0
            || self.num_h_slices > width as usize
            || self.num_v_slices > height as usize
        {
            return Err(Ffv1Error::invalid(format!(
                "slice grid {}x{} does not fit {}x{}",
                self.num_h_slices, self.num_v_slices, width, height
            )));
        }
        if self.num_h_slices > MAX_SLICES / self.num_v_slices {
            return Err(Ffv1Error::unsupported(format!(
                "{} slices",
                self.num_h_slices * self.num_v_slices
            )));
        }
        if self.quant_tables.is_empty() {
            return Err(Ffv1Error::invalid("no quantisation tables"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn params(version: u32, colorspace: Colorspace, bits: u32) -> GlobalParams {
        let layout = colorspace.layout();
        let mut p = GlobalParams::from_wire_fields(
            version,
            Coder::Range,
            None,
            colorspace.to_wire(),
            bits,
            layout.chroma_planes,
            layout.h_shift,
            layout.v_shift,
            false,
        )
        .unwrap();
        if version > 2 {
            p.micro_version = if version == 3 { 4 } else { 8 };
        }
        p.quant_tables.push(QuantTable::for_model(0, bits));
        p.fill_default_initial_states().unwrap();
        p
    }

    #[test]
    fn test_plane_count() {
        let mut p = params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        assert_eq!(p.plane_count(), 2);
        p.transparency = true;
        assert_eq!(p.plane_count(), 3);

        // Gray drops the chroma context only from version 4 on.
        let gray3 = params(3, Colorspace::YCbCr(ChromaLayout::GRAY), 8);
        assert_eq!(gray3.plane_count(), 2);
        let gray4 = params(4, Colorspace::YCbCr(ChromaLayout::GRAY), 8);
        assert_eq!(gray4.plane_count(), 1);
    }

    #[test]
    fn test_pixel_format_support() {
        assert!(params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 10)
            .check_pixel_format()
            .is_ok());
        let p = params(3, Colorspace::YCbCr(ChromaLayout::subsampled(2, 2)), 10);
        assert!(matches!(p.check_pixel_format(), Err(Ffv1Error::Unsupported(_))));
        let p = params(3, Colorspace::YCbCr(ChromaLayout::subsampled(5, 0)), 8);
        assert!(matches!(p.check_pixel_format(), Err(Ffv1Error::InvalidData(_))));
        assert!(params(3, Colorspace::Rgb, 16).check_pixel_format().is_ok());
    }

    #[test]
    fn test_grid_validation() {
        let mut p = params(3, Colorspace::YCbCr(ChromaLayout::YUV444), 8);
        p.num_h_slices = 4;
        p.num_v_slices = 4;
        assert!(p.validate(64, 64).is_ok());
        assert!(matches!(p.validate(3, 64), Err(Ffv1Error::InvalidData(_))));
        p.num_h_slices = 32;
        p.num_v_slices = 16;
        assert!(matches!(p.validate(64, 64), Err(Ffv1Error::Unsupported(_))));
    }

    #[test]
    fn test_bits_zero_means_eight() {
        let p = params(1, Colorspace::YCbCr(ChromaLayout::YUV420), 0);
        assert_eq!(p.bits_per_raw_sample, 8);
    }
}
