// src/codec/config.rs

//! Encoder and decoder settings.
//!
//! [`EncoderConfig`] is built with `with_*` calls and resolved once, when
//! the encoder is created, into the [`GlobalParams`] every frame is coded
//! with. Resolution applies the version rules: settings that a version
//! cannot carry are either upgraded (with a log line) or rejected.

use crate::coder::SymbolState;
use crate::header::params::{Coder, ErrorCheck, GlobalParams, MAX_SLICES, MAX_VERSION};
use crate::image::image_formats::{FrameLayout, PictureStructure, SampleAspectRatio};
use crate::model::QuantTable;
use crate::slice::geometry::{SliceGrid, choose_grid};
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::{debug, info};

/// How the encoder cuts frames into slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SliceRequest {
    /// Pick a grid from the frame size.
    #[default]
    Auto,
    /// A grid with exactly this many slices.
    Count(usize),
    /// `num_h x num_v` slices.
    Grid { num_h: usize, num_v: usize },
}

/// Encoder settings.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub layout: FrameLayout,
    /// Bitstream version, 0 to 4.
    pub version: u32,
    pub coder: Coder,
    /// 0 selects the small context set, 1 the large one.
    pub context_model: u32,
    /// Frames between key frames; 0 and 1 make every frame a key frame.
    pub gop_size: u32,
    pub slices: SliceRequest,
    pub error_check: ErrorCheck,
    pub picture_structure: PictureStructure,
    pub sample_aspect_ratio: SampleAspectRatio,
    /// Byte budget of every slice; derived from the frame size when unset.
    pub slice_budget: Option<usize>,
    /// Initial context states per quantisation table (version 2 and later).
    pub initial_states: Option<Vec<Vec<SymbolState>>>,
    /// Code slices on the rayon pool when the `rayon` feature is enabled.
    pub parallel: bool,
}

impl EncoderConfig {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            version: 3,
            coder: Coder::Range,
            context_model: 0,
            gop_size: 12,
            slices: SliceRequest::Auto,
            error_check: ErrorCheck::Crc,
            picture_structure: PictureStructure::Progressive,
            sample_aspect_ratio: SampleAspectRatio::default(),
            slice_budget: None,
            initial_states: None,
            parallel: true,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_coder(mut self, coder: Coder) -> Self {
        self.coder = coder;
        self
    }

    pub fn with_context_model(mut self, model: u32) -> Self {
        self.context_model = model;
        self
    }

    pub fn with_gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = gop_size;
        self
    }

    /// Requests `count` slices; 0 picks automatically.
    pub fn with_slices(mut self, count: usize) -> Self {
        self.slices = if count == 0 {
            SliceRequest::Auto
        } else {
            SliceRequest::Count(count)
        };
        self
    }

    pub fn with_slice_grid(mut self, num_h: usize, num_v: usize) -> Self {
        self.slices = SliceRequest::Grid { num_h, num_v };
        self
    }

    pub fn with_error_check(mut self, error_check: ErrorCheck) -> Self {
        self.error_check = error_check;
        self
    }

    pub fn with_picture_structure(mut self, structure: PictureStructure) -> Self {
        self.picture_structure = structure;
        self
    }

    pub fn with_sample_aspect_ratio(mut self, sar: SampleAspectRatio) -> Self {
        self.sample_aspect_ratio = sar;
        self
    }

    pub fn with_slice_budget(mut self, bytes: usize) -> Self {
        self.slice_budget = Some(bytes);
        self
    }

    pub fn with_initial_states(mut self, states: Vec<Vec<SymbolState>>) -> Self {
        self.initial_states = Some(states);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Every frame is a key frame.
    pub fn is_intra(&self) -> bool {
        self.gop_size < 2
    }

    /// Checks the settings against each other and derives the stream parameters.
    pub fn resolve(&self) -> Result<GlobalParams> {
        let l = &self.layout;
        if l.width == 0 || l.height == 0 {
            return Err(Ffv1Error::InvalidArg(format!(
                "frame size {}x{}",
                l.width, l.height
            )));
        }
        if self.version > MAX_VERSION {
            return Err(Ffv1Error::InvalidArg(format!(
                "version {} (at most {})",
                self.version, MAX_VERSION
            )));
        }
        if self.context_model > 1 {
            return Err(Ffv1Error::InvalidArg(format!(
                "context model {}",
                self.context_model
            )));
        }
        let bits = l.bits_per_raw_sample;
        if bits > 8 && self.version < 1 {
            return Err(Ffv1Error::InvalidArg(format!(
                "{} bits per sample need version 1 or later",
                bits
            )));
        }
        match self.error_check {
            ErrorCheck::Crc if self.version < 3 => {
                return Err(Ffv1Error::InvalidArg("slice CRCs need version 3 or later".into()));
            }
            ErrorCheck::SeededCrc if self.version < 4 => {
                return Err(Ffv1Error::InvalidArg("seeded CRCs need version 4 or later".into()));
            }
            _ => {}
        }

        if self.initial_states.is_some() && self.version < 2 {
            return Err(Ffv1Error::InvalidArg(
                "initial states need version 2 or later".into(),
            ));
        }

        let mut coder = self.coder;
        let golomb_limit = if self.version > 3 { 16 } else { 8 };
        if coder == Coder::GolombRice && bits > golomb_limit {
            info!(
                "{} bits per sample are coded with the range coder instead of Golomb-Rice",
                bits
            );
            coder = Coder::RangeCustom;
        }

        let mut p = GlobalParams {
            version: self.version,
            micro_version: match self.version {
                3 => 4,
                4 => 8,
                _ => 0,
            },
            coder,
            state_table: (coder == Coder::RangeCustom).then_some(crate::coder::states::VERSION2_STATE),
            colorspace: l.colorspace,
            bits_per_raw_sample: bits,
            transparency: l.transparency,
            num_h_slices: 1,
            num_v_slices: 1,
            quant_tables: Vec::new(),
            initial_states: Vec::new(),
            error_check: self.error_check,
            intra: self.is_intra(),
        };

        // Versions 0 and 1 carry a single table in every key frame.
        if self.version < 2 {
            p.quant_tables.push(QuantTable::for_model(self.context_model, bits));
        } else {
            p.quant_tables.push(QuantTable::for_model(0, bits));
            p.quant_tables.push(QuantTable::for_model(1, bits));
            if let Some(states) = &self.initial_states {
                if states.len() > p.quant_tables.len() {
                    return Err(Ffv1Error::InvalidArg(format!(
                        "{} initial state tables for {} quantisation tables",
                        states.len(),
                        p.quant_tables.len()
                    )));
                }
                for (table, rows) in p.quant_tables.iter().zip(states) {
                    if rows.len() != table.context_count {
                        return Err(Ffv1Error::InvalidArg(format!(
                            "{} initial states for {} contexts",
                            rows.len(),
                            table.context_count
                        )));
                    }
                    if rows.iter().any(|row| row.contains(&0)) {
                        return Err(Ffv1Error::InvalidArg("initial state of zero".into()));
                    }
                }
                p.initial_states = states.clone();
            }
        }
        p.fill_default_initial_states()?;

        let grid = self.grid(&p)?;
        p.num_h_slices = grid.num_h;
        p.num_v_slices = grid.num_v;
        p.validate(l.width, l.height)?;
        debug!(
            "encoder v{}.{} {:?} {:?} {} bits, {}x{} slices",
            p.version,
            p.micro_version,
            p.coder,
            p.colorspace,
            bits,
            grid.num_h,
            grid.num_v
        );
        Ok(p)
    }

    fn grid(&self, p: &GlobalParams) -> Result<SliceGrid> {
        let (w, h) = (self.layout.width as usize, self.layout.height as usize);
        if self.version < 2 {
            return match self.slices {
                SliceRequest::Auto | SliceRequest::Count(1) | SliceRequest::Grid { num_h: 1, num_v: 1 } => {
                    Ok(SliceGrid::new(1, 1))
                }
                _ => Err(Ffv1Error::InvalidArg(format!(
                    "version {} streams have a single slice",
                    self.version
                ))),
            };
        }
        match self.slices {
            SliceRequest::Auto => choose_grid(p, w, h, 0),
            SliceRequest::Count(n) => choose_grid(p, w, h, n),
            SliceRequest::Grid { num_h, num_v } => {
                if num_h == 0 || num_v == 0 || num_h > w || num_v > h || num_h * num_v > MAX_SLICES {
                    return Err(Ffv1Error::InvalidArg(format!(
                        "slice grid {}x{} for a {}x{} frame",
                        num_h, num_v, w, h
                    )));
                }
                Ok(SliceGrid::new(num_h, num_v))
            }
        }
    }

    /// Quantisation table every plane uses.
    pub(crate) fn quant_index(&self) -> usize {
        if self.version < 2 { 0 } else { self.context_model as usize }
    }
}

/// Decoder settings. The bitstream does not carry the frame size, so the
/// container has to supply it.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub width: u32,
    pub height: u32,
    /// Global header of a version 2 or later stream.
    pub extradata: Option<Vec<u8>>,
    /// Streams with more slices are refused.
    pub max_slices: usize,
    pub parallel: bool,
}

impl DecoderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            extradata: None,
            max_slices: MAX_SLICES,
            parallel: true,
        }
    }

    pub fn with_extradata(mut self, extradata: impl Into<Vec<u8>>) -> Self {
        self.extradata = Some(extradata.into());
        self
    }

    pub fn with_max_slices(mut self, max_slices: usize) -> Self {
        self.max_slices = max_slices;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
