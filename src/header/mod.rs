//! Bitstream headers: the global header ([`extradata`]), the in-band frame
//! headers of versions 0 to 2 ([`frame`]) and the per-slice header of
//! version 3 and later ([`slice`]).
//!
//! [`HeaderState`] tracks where a decoder is in a stream:
//!
//! ```text
//! Init -> (extradata) -> GlobalHeaderParsed -> AwaitingKeyframe -> Decoding
//! ```
//!
//! A failed key frame drops the decoder back to `AwaitingKeyframe`, where
//! non-key frames are refused until the next valid key frame.

pub mod extradata;
pub mod frame;
pub mod params;
pub mod slice;

pub use extradata::{read_extradata, write_extradata};
pub use params::{ChromaLayout, Coder, Colorspace, ErrorCheck, GlobalParams, MAX_SLICES, MAX_VERSION};
pub use slice::{CodingMode, SliceHeader};

use crate::coder::{INITIAL_STATE, RangeDecoder, RangeEncoder, fresh_symbol_state};
use crate::slice::geometry::SliceGrid;
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderPhase {
    Init,
    GlobalHeaderParsed,
    AwaitingKeyframe,
    Decoding,
}

/// Codes the key-frame bit and, on key frames of versions 0 to 2, the
/// in-band header. Uses the default transition table.
pub fn write_frame_start(c: &mut RangeEncoder, p: &GlobalParams, key_frame: bool, slices: &[SliceHeader]) {
    let mut keystate = INITIAL_STATE;
    c.put_bit(&mut keystate, key_frame);
    if !key_frame {
        return;
    }
    let mut state = fresh_symbol_state();
    match p.version {
        0 | 1 => frame::write_keyframe_header(c, &mut state, p),
        2 => frame::write_slice_list(c, &mut state, slices),
        _ => {}
    }
}

/// Decoder-side header state of one stream.
#[derive(Debug, Clone)]
pub struct HeaderState {
    phase: HeaderPhase,
    params: Option<GlobalParams>,
    width: u32,
    height: u32,
    max_slices: usize,
    /// Slices announced in-band (versions 0 to 2), kept for non-key frames.
    slices: Vec<SliceHeader>,
}

impl HeaderState {
    pub fn new(width: u32, height: u32, max_slices: usize) -> Self {
        Self {
            phase: HeaderPhase::Init,
            params: None,
            width,
            height,
            max_slices: max_slices.clamp(1, MAX_SLICES),
            slices: Vec::new(),
        }
    }

    /// Parses the global header of a version 2 or later stream.
    pub fn load_extradata(&mut self, data: &[u8]) -> Result<()> {
        if self.phase != HeaderPhase::Init {
            return Err(Ffv1Error::invalid("global header after the stream started"));
        }
        let p = read_extradata(data, self.width, self.height)?;
        if p.version > 2 && SliceGrid::of(&p).count() > self.max_slices {
            return Err(Ffv1Error::invalid(format!(
                "{} slices exceed the limit of {}",
                p.slice_count(),
                self.max_slices
            )));
        }
        self.params = Some(p);
        self.phase = HeaderPhase::GlobalHeaderParsed;
        Ok(())
    }

    pub fn phase(&self) -> HeaderPhase {
        self.phase
    }

    pub fn params(&self) -> Option<&GlobalParams> {
        self.params.as_ref()
    }

    /// In-band slice list of the current key-frame period (versions 0 to 2).
    pub fn slices(&self) -> &[SliceHeader] {
        &self.slices
    }

    /// Reads the key-frame bit and whatever header follows it.
    ///
    /// Returns whether the frame is a key frame.
    pub fn read_frame_start(&mut self, c: &mut RangeDecoder<'_>) -> Result<bool> {
        if matches!(self.phase, HeaderPhase::Init | HeaderPhase::GlobalHeaderParsed) {
            self.phase = HeaderPhase::AwaitingKeyframe;
        }
        let mut keystate = INITIAL_STATE;
        let key_frame = c.get_bit(&mut keystate);
        if !key_frame {
            if self.phase != HeaderPhase::Decoding {
                return Err(Ffv1Error::invalid("non-key frame without a preceding key frame"));
            }
            return Ok(false);
        }
        match self.read_keyframe(c) {
            Ok(()) => {
                self.phase = HeaderPhase::Decoding;
                Ok(true)
            }
            Err(e) => {
                warn!("key frame header rejected: {}", e);
                self.phase = HeaderPhase::AwaitingKeyframe;
                Err(e)
            }
        }
    }

    fn read_keyframe(&mut self, c: &mut RangeDecoder<'_>) -> Result<()> {
        let mut state = fresh_symbol_state();
        let version = self.params.as_ref().map(|p| p.version);
        match version {
            Some(v) if v > 2 => {}
            Some(2) => {
                if let Some(p) = &self.params {
                    self.slices = frame::read_slice_list(c, &mut state, p, self.max_slices)?;
                    debug!("version 2 key frame with {} slices", self.slices.len());
                }
            }
            _ => {
                let p = frame::read_keyframe_header(c, &mut state, self.width, self.height)?;
                if let Some(old) = &self.params {
                    if *old != p {
                        return Err(Ffv1Error::invalid("stream parameters changed on a key frame"));
                    }
                } else {
                    debug!(
                        "version {} stream: {:?}, {} bits, coder {:?}",
                        p.version, p.colorspace, p.bits_per_raw_sample, p.coder
                    );
                }
                self.slices = vec![SliceHeader::new(&p, SliceGrid::of(&p).cell(0), 0)];
                self.params = Some(p);
            }
        }
        if c.is_corrupt() {
            return Err(Ffv1Error::invalid("corrupt frame header"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::params::tests::params;

    fn packet(p: &GlobalParams, key: bool) -> Vec<u8> {
        let slices = vec![SliceHeader::new(p, SliceGrid::of(p).cell(0), 0)];
        let mut c = RangeEncoder::new(4096);
        write_frame_start(&mut c, p, key, &slices);
        c.terminate(false);
        c.into_bytes()
    }

    #[test]
    fn test_non_key_frame_first_is_refused() {
        let p = params(1, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        let mut h = HeaderState::new(32, 32, MAX_SLICES);
        let data = packet(&p, false);
        assert!(h.read_frame_start(&mut RangeDecoder::new(&data)).is_err());
        assert_eq!(h.phase(), HeaderPhase::AwaitingKeyframe);

        let data = packet(&p, true);
        assert!(h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap());
        assert_eq!(h.phase(), HeaderPhase::Decoding);
        assert_eq!(h.params(), Some(&p));

        let data = packet(&p, false);
        assert!(!h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap());
    }

    #[test]
    fn test_parameter_change_needs_new_stream() {
        let p = params(1, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        let mut h = HeaderState::new(32, 32, MAX_SLICES);
        let data = packet(&p, true);
        h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap();

        let mut changed = p.clone();
        changed.transparency = true;
        let data = packet(&changed, true);
        let err = h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap_err();
        assert!(matches!(err, Ffv1Error::InvalidData(_)));
        assert_eq!(h.phase(), HeaderPhase::AwaitingKeyframe);

        // The original parameters are still accepted.
        let data = packet(&p, true);
        assert!(h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap());
    }

    #[test]
    fn test_extradata_phases() {
        let mut p = params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        p.error_check = ErrorCheck::Crc;
        let blob = write_extradata(&p).unwrap();
        let mut h = HeaderState::new(32, 32, MAX_SLICES);
        h.load_extradata(&blob).unwrap();
        assert_eq!(h.phase(), HeaderPhase::GlobalHeaderParsed);
        assert!(h.load_extradata(&blob).is_err());

        let data = packet(&p, true);
        assert!(h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap());
        assert_eq!(h.phase(), HeaderPhase::Decoding);
    }

    #[test]
    fn test_version_two_slice_list_is_kept() {
        let mut p = params(2, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        p.num_h_slices = 2;
        let blob = write_extradata(&p).unwrap();
        let mut h = HeaderState::new(32, 32, MAX_SLICES);
        h.load_extradata(&blob).unwrap();

        let grid = SliceGrid::of(&p);
        let slices: Vec<_> = grid.cells().map(|c| SliceHeader::new(&p, c, 0)).collect();
        let mut c = RangeEncoder::new(256);
        write_frame_start(&mut c, &p, true, &slices);
        c.terminate(false);
        let data = c.into_bytes();
        h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap();
        assert_eq!(h.slices(), &slices[..]);

        let data = packet(&p, false);
        h.read_frame_start(&mut RangeDecoder::new(&data)).unwrap();
        assert_eq!(h.slices().len(), 2);
    }
}
