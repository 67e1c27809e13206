// src/codec/encoder.rs

//! Frame encoder.
//!
//! One [`Encoder`] codes one stream. It owns the per-slice contexts, which
//! adapt from frame to frame and restart on every key frame.

use super::config::EncoderConfig;
use super::executor::map_slices;
use super::packet;
use crate::coder::RangeEncoder;
use crate::header::extradata::write_extradata;
use crate::header::params::GlobalParams;
use crate::header::slice::SliceHeader;
use crate::header::write_frame_start;
use crate::image::image_formats::{Frame, FrameLayout};
use crate::slice::codec::{EncodedSlice, encode_slice};
use crate::slice::geometry::SliceGrid;
use crate::slice::state::SliceState;
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::{debug, info, warn};

/// Fixed part of the derived slice budget.
const SLICE_BUDGET_BASE: usize = 1024;
/// Worst-case coded bytes per sample of the derived budget.
const BYTES_PER_SAMPLE: usize = 4;

pub struct Encoder {
    config: EncoderConfig,
    params: GlobalParams,
    quant_index: usize,
    extradata: Option<Vec<u8>>,
    states: Vec<SliceState>,
    frame_number: u64,
    /// The next frame must be a key frame.
    force_key: bool,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let params = config.resolve()?;
        let extradata = if params.version >= 2 {
            Some(write_extradata(&params)?)
        } else {
            None
        };
        let mut states = Vec::new();
        states.try_reserve_exact(params.slice_count())?;
        states.resize_with(params.slice_count(), SliceState::default);
        info!(
            "FFV1 encoder: {}x{} {:?} {} bits, version {}, {} slices",
            config.layout.width,
            config.layout.height,
            params.colorspace,
            params.bits_per_raw_sample,
            params.version,
            params.slice_count()
        );
        Ok(Self {
            quant_index: config.quant_index(),
            config,
            params,
            extradata,
            states,
            frame_number: 0,
            force_key: false,
        })
    }

    pub fn params(&self) -> &GlobalParams {
        &self.params
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Global header to store in the container (version 2 and later).
    pub fn extradata(&self) -> Option<&[u8]> {
        self.extradata.as_deref()
    }

    /// Frames coded so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    fn slice_budget(&self) -> usize {
        if let Some(bytes) = self.config.slice_budget {
            return bytes;
        }
        let l = &self.config.layout;
        let samples = l.width as usize * l.height as usize * l.plane_count();
        SLICE_BUDGET_BASE + samples * BYTES_PER_SAMPLE / self.params.slice_count()
    }

    fn check_layout(&self, frame: &Frame) -> Result<()> {
        let want: &FrameLayout = &self.config.layout;
        let got = frame.layout();
        if (got.width, got.height) != (want.width, want.height) {
            return Err(Ffv1Error::DimensionMismatch {
                expected: (want.width, want.height),
                actual: (got.width, got.height),
            });
        }
        if got != want {
            return Err(Ffv1Error::InvalidArg(format!(
                "frame is {:?} {} bits, the stream {:?} {} bits",
                got.colorspace, got.bits_per_raw_sample, want.colorspace, want.bits_per_raw_sample
            )));
        }
        Ok(())
    }

    /// Codes `frame` into one packet.
    ///
    /// A failed frame leaves the slice contexts out of step with any decoder,
    /// so the frame after it is always a key frame.
    pub fn encode(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        self.check_layout(frame)?;
        let gop = self.config.gop_size.max(1) as u64;
        let key_frame = self.force_key || self.params.intra || self.frame_number % gop == 0;
        match self.encode_packet(frame, key_frame) {
            Ok(out) => {
                self.force_key = false;
                self.frame_number += 1;
                debug!(
                    "frame {} ({}): {} bytes",
                    self.frame_number - 1,
                    if key_frame { "key" } else { "inter" },
                    out.len()
                );
                Ok(out)
            }
            Err(e) => {
                warn!("frame {} not coded: {}", self.frame_number, e);
                self.force_key = true;
                Err(e)
            }
        }
    }

    fn encode_packet(&mut self, frame: &Frame, key_frame: bool) -> Result<Vec<u8>> {
        let p = &self.params;
        let headers: Vec<SliceHeader> = SliceGrid::of(p)
            .cells()
            .map(|cell| {
                let mut h = SliceHeader::new(p, cell, self.quant_index);
                h.picture_structure = self.config.picture_structure;
                h.sample_aspect_ratio = self.config.sample_aspect_ratio;
                h
            })
            .collect();

        let budget = self.slice_budget();
        let mut first = RangeEncoder::new(budget);
        write_frame_start(&mut first, p, key_frame, &headers);
        first.set_transitions(p.transitions());

        let mut starts = Vec::with_capacity(headers.len());
        starts.push(first);
        for _ in 1..headers.len() {
            let mut c = RangeEncoder::new(budget);
            c.set_transitions(p.transitions());
            starts.push(c);
        }

        let jobs: Vec<_> = self
            .states
            .iter_mut()
            .zip(headers)
            .zip(starts)
            .enumerate()
            .map(|(index, ((state, header), start))| (index, state, header, start))
            .collect();
        let slices = map_slices(jobs, self.config.parallel, |(index, state, header, start)| {
            encode_slice(p, state, frame, header, key_frame, start, index)
        })
        .into_iter()
        .collect::<Result<Vec<EncodedSlice>>>()?;

        let mut out = Vec::new();
        for (index, slice) in slices.iter().enumerate() {
            packet::write_slice(&mut out, &slice.data, index, p)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::params::{ChromaLayout, ErrorCheck};
    use crate::coder::{INITIAL_STATE, RangeDecoder};
    use crate::image::image_formats::Plane;

    fn is_key(packet: &[u8]) -> bool {
        let mut state = INITIAL_STATE;
        RangeDecoder::new(packet).get_bit(&mut state)
    }

    fn frame(layout: FrameLayout, seed: u32) -> Frame {
        let planes = (0..layout.plane_count())
            .map(|i| {
                let (w, h) = layout.plane_size(i);
                Plane::from_fn(w, h, |x, y| ((x * 3 + y * 7 + seed + i as u32) % 256) as u16)
            })
            .collect();
        Frame::from_planes(layout, planes).unwrap()
    }

    #[test]
    fn test_key_frame_cadence() {
        let layout = FrameLayout::yuv(32, 16, ChromaLayout::YUV420, 8);
        let mut enc = Encoder::new(EncoderConfig::new(layout).with_gop_size(3).with_slices(1)).unwrap();
        assert!(enc.extradata().is_some());
        let keys: Vec<bool> = (0..7)
            .map(|i| {
                let data = enc.encode(&frame(layout, i)).unwrap();
                is_key(&data)
            })
            .collect();
        assert_eq!(keys, [true, false, false, true, false, false, true]);
        assert_eq!(enc.frame_number(), 7);
    }

    #[test]
    fn test_wrong_frame_is_refused() {
        let layout = FrameLayout::yuv(32, 16, ChromaLayout::YUV420, 8);
        let mut enc = Encoder::new(EncoderConfig::new(layout)).unwrap();
        let err = enc.encode(&frame(FrameLayout::yuv(16, 16, ChromaLayout::YUV420, 8), 0)).unwrap_err();
        assert!(matches!(err, Ffv1Error::DimensionMismatch { .. }));
        let err = enc.encode(&frame(FrameLayout::gray(32, 16, 8), 0)).unwrap_err();
        assert!(matches!(err, Ffv1Error::InvalidArg(_)));
        assert_eq!(enc.frame_number(), 0);
    }

    #[test]
    fn test_failed_frame_forces_key_frame() {
        let layout = FrameLayout::gray(32, 32, 8);
        let config = EncoderConfig::new(layout)
            .with_gop_size(100)
            .with_slices(1)
            .with_error_check(ErrorCheck::None)
            .with_slice_budget(64);
        let mut enc = Encoder::new(config).unwrap();
        let noisy = Frame::from_planes(
            layout,
            vec![Plane::from_fn(32, 32, |x, y| ((x * 7919 + y * 104_729) % 251) as u16)],
        )
        .unwrap();
        let flat = Frame::new(layout);

        assert!(is_key(&enc.encode(&flat).unwrap()));
        let err = enc.encode(&noisy).unwrap_err();
        assert!(matches!(err, Ffv1Error::Overflow { slice: 0, .. }));
        assert!(is_key(&enc.encode(&flat).unwrap()));
        assert!(!is_key(&enc.encode(&flat).unwrap()));
    }

    #[test]
    fn test_version_one_has_no_extradata() {
        let layout = FrameLayout::yuv(24, 24, ChromaLayout::YUV444, 10);
        let enc = Encoder::new(
            EncoderConfig::new(layout)
                .with_version(1)
                .with_error_check(ErrorCheck::None),
        )
        .unwrap();
        assert!(enc.extradata().is_none());
        assert_eq!(enc.params().slice_count(), 1);
    }
}
