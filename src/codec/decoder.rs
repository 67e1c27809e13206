// src/codec/decoder.rs

//! Frame decoder.
//!
//! Slices are independent once the frame header is read, so a damaged
//! slice only costs its own rectangle: the decoder fills it from the
//! previous frame and reports it in [`DecodedFrame::damaged_slices`].
//! Header and framing errors reject the whole packet.

use super::config::DecoderConfig;
use super::executor::map_slices;
use super::packet;
use crate::coder::RangeDecoder;
use crate::header::params::GlobalParams;
use crate::header::{HeaderPhase, HeaderState};
use crate::image::geom::Rect;
use crate::image::image_formats::{Frame, FrameLayout};
use crate::slice::codec::{DecodedSlice, SliceInput, decode_slice};
use crate::slice::geometry::SliceGrid;
use crate::slice::state::SliceState;
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::{debug, warn};

/// A decoded picture and what went wrong while decoding it.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub key_frame: bool,
    /// Slices that could not be decoded, in slice order.
    pub damaged_slices: Vec<usize>,
    /// True when damaged areas were filled from the previous frame rather
    /// than left at zero.
    pub concealed: bool,
}

impl DecodedFrame {
    pub fn is_intact(&self) -> bool {
        self.damaged_slices.is_empty()
    }
}

pub struct Decoder {
    config: DecoderConfig,
    header: HeaderState,
    states: Vec<SliceState>,
    previous: Option<Frame>,
}

impl Decoder {
    /// Creates a decoder; `config.extradata` is parsed here.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(Ffv1Error::InvalidArg(format!(
                "frame size {}x{}",
                config.width, config.height
            )));
        }
        let mut header = HeaderState::new(config.width, config.height, config.max_slices);
        if let Some(extradata) = &config.extradata {
            header.load_extradata(extradata)?;
        }
        Ok(Self {
            config,
            header,
            states: Vec::new(),
            previous: None,
        })
    }

    /// Stream parameters, once known.
    pub fn params(&self) -> Option<&GlobalParams> {
        self.header.params()
    }

    pub fn phase(&self) -> HeaderPhase {
        self.header.phase()
    }

    /// Decodes one packet.
    pub fn decode(&mut self, packet: &[u8]) -> Result<DecodedFrame> {
        if packet.is_empty() {
            return Err(Ffv1Error::invalid("empty packet"));
        }
        let mut coder = RangeDecoder::new(packet);
        let key_frame = self.header.read_frame_start(&mut coder)?;
        let p = self
            .header
            .params()
            .ok_or_else(|| Ffv1Error::invalid("no stream parameters before the first frame"))?;
        coder.set_transitions(p.transitions());
        let layout = FrameLayout::for_stream(p, self.config.width, self.config.height);

        let inband = self.header.slices();
        let inband_count = (p.version <= 2).then_some(inband.len());
        let spans = packet::locate_slices(packet, p, inband_count, self.config.max_slices)?;
        if self.states.len() < spans.len() {
            self.states.try_reserve(spans.len() - self.states.len())?;
            self.states.resize_with(spans.len(), SliceState::default);
        }

        let mut damaged = Vec::new();
        let mut jobs = Vec::with_capacity(spans.len());
        for (index, (span, state)) in spans.iter().zip(self.states.iter_mut()).enumerate() {
            if !span.crc_ok {
                state.damaged = true;
                damaged.push(index);
                continue;
            }
            let payload = &packet[span.offset..span.offset + span.len];
            let slice_coder = if index == 0 {
                // The first slice continues the coder that read the frame header.
                let mut c = coder.clone();
                c.truncate(span.len);
                c
            } else {
                let mut c = RangeDecoder::new(payload);
                c.set_transitions(p.transitions());
                c
            };
            let input = SliceInput {
                index,
                payload,
                coder: slice_coder,
                header: if p.version <= 2 {
                    inband.get(index).cloned()
                } else {
                    None
                },
            };
            jobs.push((input, state));
        }

        let results = map_slices(jobs, self.config.parallel, |(input, state)| {
            let index = input.index;
            (index, decode_slice(p, state, &layout, input, key_frame))
        });

        let mut frame = Frame::new(layout);
        let mut decoded: Vec<DecodedSlice> = Vec::with_capacity(results.len());
        for (index, result) in results {
            match result {
                Ok(slice) => {
                    if index == 0 {
                        frame.picture_structure = slice.header.picture_structure;
                        frame.sample_aspect_ratio = slice.header.sample_aspect_ratio;
                    }
                    decoded.push(slice);
                }
                Err(e) if e.is_slice_local() => {
                    warn!("{}", e);
                    damaged.push(index);
                }
                Err(e) => return Err(e),
            }
        }
        for slice in &decoded {
            for (i, plane) in slice.planes.iter().enumerate() {
                let r = layout.plane_rect(i, slice.rect);
                frame.plane_mut(i).paste(plane, r.x, r.y);
            }
        }
        damaged.sort_unstable();

        let mut concealed = false;
        if !damaged.is_empty() {
            let grid = SliceGrid::of(p);
            let rects: Vec<Rect> = damaged
                .iter()
                .filter_map(|&index| {
                    let cell = match inband.get(index) {
                        Some(h) if p.version <= 2 => h.cell,
                        _ if index < grid.count() => grid.cell(index),
                        _ => return None,
                    };
                    Some(grid.rect(&cell, layout.width as usize, layout.height as usize))
                })
                .collect();
            if let Some(previous) = self.previous.as_ref().filter(|f| *f.layout() == layout) {
                for rect in rects {
                    frame.copy_region_from(previous, rect);
                }
                concealed = true;
            }
            warn!(
                "{} of {} slices damaged{}",
                damaged.len(),
                spans.len(),
                if concealed { ", concealed from the previous frame" } else { "" }
            );
        }

        debug!(
            "decoded {} frame from {} bytes in {} slices",
            if key_frame { "key" } else { "inter" },
            packet.len(),
            spans.len()
        );
        self.previous = Some(frame.clone());
        Ok(DecodedFrame {
            frame,
            key_frame,
            damaged_slices: damaged,
            concealed,
        })
    }
}
