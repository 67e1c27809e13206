// src/slice/codec.rs

//! Encoding and decoding of one slice.
//!
//! A slice owns its coder cursor, its line buffers and (through
//! [`SliceState`]) its adaptive contexts, so slices of one frame can run on
//! different threads. YCbCr slices code each plane whole; RGB slices code the
//! transformed G, B, R and alpha lines interleaved.
//!
//! The range-coded slices of version 3 and later end with a sentinel decision
//! and must decode to exactly their payload length. Any inconsistency found
//! while decoding is reported as [`Ffv1Error::Damaged`] and leaves the slice
//! state unusable until the next reset.

use super::geometry::SliceGrid;
use super::line::{
    GolombResidualSource, GolombResiduals, RangeResidualSource, RangeResiduals, decode_line,
    decode_pcm_line, encode_line, encode_pcm_line,
};
use super::rct::choose_rct_params;
use super::sample::{LineRing, Sample};
use super::state::SliceState;
use crate::coder::run::{RunDecoder, RunEncoder};
use crate::coder::{BitReader, BitWriter, RangeDecoder, RangeEncoder};
use crate::header::params::GlobalParams;
use crate::header::slice::{CodingMode, SliceHeader};
use crate::image::geom::Rect;
use crate::image::image_formats::{Frame, FrameLayout, Plane};
use crate::model::{PlaneContext, QuantTable};
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::info;

/// Coded bytes of one slice, trailer excluded.
#[derive(Debug, Clone)]
pub struct EncodedSlice {
    pub data: Vec<u8>,
    /// The header as coded; the PCM fallback changes its mode.
    pub header: SliceHeader,
}

/// Everything the decoder of one slice reads from.
#[derive(Debug)]
pub struct SliceInput<'a> {
    pub index: usize,
    /// Payload bytes, trailer excluded.
    pub payload: &'a [u8],
    /// Range decoder reading `payload` from its first byte. For the first
    /// slice it has already consumed the frame start.
    pub coder: RangeDecoder<'a>,
    /// Header carried by the frame for versions 0 to 2; later versions read
    /// it from the slice.
    pub header: Option<SliceHeader>,
}

/// Samples of one slice, one buffer per frame plane.
#[derive(Debug, Clone)]
pub struct DecodedSlice {
    /// Luma rectangle of the slice.
    pub rect: Rect,
    pub planes: Vec<Plane>,
    pub header: SliceHeader,
}

fn ring_rows(q: &QuantTable) -> usize {
    if q.uses_far_neighbours() { 3 } else { 2 }
}

/// Plane context of frame plane `index` of a YCbCr slice.
fn ycbcr_context(p: &GlobalParams, index: usize) -> usize {
    let chroma = p.chroma_planes();
    match index {
        0 => 0,
        1 | 2 if chroma => 1,
        _ if chroma => 2,
        _ => 1,
    }
}

/// Plane context of G, B, R and alpha.
fn rgb_context(index: usize) -> usize {
    index.div_ceil(2)
}

fn plane_context<'s>(
    p: &'s GlobalParams,
    state: &'s mut SliceState,
    index: usize,
) -> Result<(&'s mut PlaneContext, &'s QuantTable)> {
    let plane = state
        .planes
        .get_mut(index)
        .ok_or_else(|| Ffv1Error::invalid(format!("no plane context {}", index)))?;
    let q = p.quant_tables.get(plane.quant_index).ok_or_else(|| {
        Ffv1Error::invalid(format!("quantisation table {}", plane.quant_index))
    })?;
    Ok((plane, q))
}

fn damage(state: &mut SliceState, slice: usize, reason: impl Into<String>) -> Ffv1Error {
    state.damaged = true;
    Ffv1Error::Damaged {
        slice,
        reason: reason.into(),
    }
}

// --- Line back-ends ---

trait LineEncoder {
    /// Before every plane of a YCbCr slice and once before an RGB slice.
    fn begin_plane(&mut self) {}
    fn encode<S: Sample>(&mut self, plane: &mut PlaneContext, q: &QuantTable, ring: &LineRing<S>, bits: u32);
}

trait LineDecoder {
    fn begin_plane(&mut self) {}
    fn decode<S: Sample>(&mut self, plane: &mut PlaneContext, q: &QuantTable, ring: &mut LineRing<S>, bits: u32);
}

struct RangeLines<'a> {
    c: &'a mut RangeEncoder,
}

impl LineEncoder for RangeLines<'_> {
    fn encode<S: Sample>(&mut self, plane: &mut PlaneContext, q: &QuantTable, ring: &LineRing<S>, bits: u32) {
        encode_line(&mut RangeResiduals { c: &mut *self.c }, plane, q, ring, bits);
    }
}

struct GolombLines<'a> {
    w: &'a mut BitWriter,
    run: RunEncoder,
}

impl LineEncoder for GolombLines<'_> {
    fn begin_plane(&mut self) {
        self.run.reset();
    }

    fn encode<S: Sample>(&mut self, plane: &mut PlaneContext, q: &QuantTable, ring: &LineRing<S>, bits: u32) {
        let mut sink = GolombResiduals {
            w: &mut *self.w,
            run: &mut self.run,
        };
        encode_line(&mut sink, plane, q, ring, bits);
    }
}

struct PcmLines<'a> {
    c: &'a mut RangeEncoder,
}

impl LineEncoder for PcmLines<'_> {
    fn encode<S: Sample>(&mut self, _plane: &mut PlaneContext, _q: &QuantTable, ring: &LineRing<S>, bits: u32) {
        encode_pcm_line(self.c, ring, bits);
    }
}

struct RangeLineSource<'a, 'b> {
    c: &'a mut RangeDecoder<'b>,
}

impl LineDecoder for RangeLineSource<'_, '_> {
    fn decode<S: Sample>(&mut self, plane: &mut PlaneContext, q: &QuantTable, ring: &mut LineRing<S>, bits: u32) {
        decode_line(&mut RangeResidualSource { c: &mut *self.c }, plane, q, ring, bits);
    }
}

struct GolombLineSource<'a, 'b> {
    r: &'a mut BitReader<'b>,
    run: RunDecoder,
}

impl LineDecoder for GolombLineSource<'_, '_> {
    fn begin_plane(&mut self) {
        self.run.reset();
    }

    fn decode<S: Sample>(&mut self, plane: &mut PlaneContext, q: &QuantTable, ring: &mut LineRing<S>, bits: u32) {
        let mut src = GolombResidualSource {
            r: &mut *self.r,
            run: &mut self.run,
        };
        decode_line(&mut src, plane, q, ring, bits);
    }
}

struct PcmLineSource<'a, 'b> {
    c: &'a mut RangeDecoder<'b>,
}

impl LineDecoder for PcmLineSource<'_, '_> {
    fn decode<S: Sample>(&mut self, _plane: &mut PlaneContext, _q: &QuantTable, ring: &mut LineRing<S>, bits: u32) {
        decode_pcm_line(self.c, ring, bits);
    }
}

// --- Planes ---

fn encode_ycbcr<E: LineEncoder>(
    e: &mut E,
    p: &GlobalParams,
    state: &mut SliceState,
    frame: &Frame,
    rect: Rect,
) -> Result<()> {
    let layout = *frame.layout();
    let bits = p.bits_per_raw_sample;
    for (i, plane) in frame.planes().iter().enumerate() {
        let r = layout.plane_rect(i, rect);
        let (ctx, q) = plane_context(p, state, ycbcr_context(p, i))?;
        let mut ring = LineRing::<i16>::new(r.width, ring_rows(q))?;
        e.begin_plane();
        for y in r.y..r.y_max() {
            ring.advance();
            let src = &plane.row(y)[r.x..r.x_max()];
            for (dst, &v) in ring.current_mut().iter_mut().zip(src) {
                *dst = v as i16;
            }
            e.encode(ctx, q, &ring, bits);
        }
        crate::slice_trace!("plane {} {}x{} at ({}, {})", i, r.width, r.height, r.x, r.y);
    }
    Ok(())
}

fn decode_ycbcr<D: LineDecoder>(
    d: &mut D,
    p: &GlobalParams,
    state: &mut SliceState,
    planes: &mut [Plane],
) -> Result<()> {
    let bits = p.bits_per_raw_sample;
    for (i, out) in planes.iter_mut().enumerate() {
        let (ctx, q) = plane_context(p, state, ycbcr_context(p, i))?;
        let mut ring = LineRing::<i16>::new(out.width() as usize, ring_rows(q))?;
        d.begin_plane();
        for y in 0..out.height() as usize {
            ring.advance();
            d.decode(ctx, q, &mut ring, bits);
            for (dst, &v) in out.row_mut(y).iter_mut().zip(ring.current()) {
                *dst = v as u16;
            }
        }
    }
    Ok(())
}

fn rgb_rings<S: Sample>(p: &GlobalParams, state: &mut SliceState, count: usize, width: usize) -> Result<Vec<LineRing<S>>> {
    let mut rings = Vec::with_capacity(count);
    for i in 0..count {
        let (_, q) = plane_context(p, state, rgb_context(i))?;
        rings.push(LineRing::<S>::new(width, ring_rows(q))?);
    }
    Ok(rings)
}

fn encode_rgb<S: Sample, E: LineEncoder>(
    e: &mut E,
    p: &GlobalParams,
    state: &mut SliceState,
    frame: &Frame,
    rect: Rect,
    header: &SliceHeader,
) -> Result<()> {
    let transform = header.coding_mode == CodingMode::Normal;
    let bits = p.bits_per_raw_sample + transform as u32;
    let offset = 1i32 << p.bits_per_raw_sample;
    let count = frame.planes().len();
    let mut rings = rgb_rings::<S>(p, state, count, rect.width)?;

    e.begin_plane();
    for y in rect.y..rect.y_max() {
        for ring in rings.iter_mut() {
            ring.advance();
        }
        let g = &frame.plane(0).row(y)[rect.x..rect.x_max()];
        let b = &frame.plane(1).row(y)[rect.x..rect.x_max()];
        let r = &frame.plane(2).row(y)[rect.x..rect.x_max()];
        for x in 0..rect.width {
            let (g, b, r) = (g[x] as i32, b[x] as i32, r[x] as i32);
            let (cy, cb, cr) = if transform {
                header.rct.forward(g, b, r, offset)
            } else {
                (g, b, r)
            };
            rings[0].set(x, cy);
            rings[1].set(x, cb);
            rings[2].set(x, cr);
        }
        if count > 3 {
            let a = &frame.plane(3).row(y)[rect.x..rect.x_max()];
            for (x, &v) in a.iter().enumerate() {
                rings[3].set(x, v as i32);
            }
        }
        for (i, ring) in rings.iter().enumerate() {
            let (ctx, q) = plane_context(p, state, rgb_context(i))?;
            e.encode(ctx, q, ring, bits);
        }
    }
    Ok(())
}

fn decode_rgb<S: Sample, D: LineDecoder>(
    d: &mut D,
    p: &GlobalParams,
    state: &mut SliceState,
    planes: &mut [Plane],
    header: &SliceHeader,
) -> Result<()> {
    let transform = header.coding_mode == CodingMode::Normal;
    let bits = p.bits_per_raw_sample + transform as u32;
    let offset = 1i32 << p.bits_per_raw_sample;
    let mask = (1i32 << p.bits_per_raw_sample) - 1;
    let width = planes.first().map_or(0, |pl| pl.width() as usize);
    let height = planes.first().map_or(0, |pl| pl.height() as usize);
    let mut rings = rgb_rings::<S>(p, state, planes.len(), width)?;

    d.begin_plane();
    for y in 0..height {
        for (i, ring) in rings.iter_mut().enumerate() {
            ring.advance();
            let (ctx, q) = plane_context(p, state, rgb_context(i))?;
            d.decode(ctx, q, ring, bits);
        }
        for x in 0..width {
            let (cy, cb, cr) = (rings[0].get(x), rings[1].get(x), rings[2].get(x));
            let (g, b, r) = if transform {
                header.rct.inverse(cy, cb, cr, offset)
            } else {
                (cy, cb, cr)
            };
            planes[0].row_mut(y)[x] = (g & mask) as u16;
            planes[1].row_mut(y)[x] = (b & mask) as u16;
            planes[2].row_mut(y)[x] = (r & mask) as u16;
        }
        if let (Some(ring), Some(out)) = (rings.get(3), planes.get_mut(3)) {
            for (dst, &v) in out.row_mut(y).iter_mut().zip(ring.current()) {
                *dst = (v.to_i32() & mask) as u16;
            }
        }
    }
    Ok(())
}

fn encode_planes<E: LineEncoder>(
    e: &mut E,
    p: &GlobalParams,
    state: &mut SliceState,
    frame: &Frame,
    rect: Rect,
    header: &SliceHeader,
) -> Result<()> {
    if !p.colorspace.is_rgb() {
        encode_ycbcr(e, p, state, frame, rect)
    } else if p.bits_per_raw_sample <= 14 {
        encode_rgb::<i16, E>(e, p, state, frame, rect, header)
    } else {
        encode_rgb::<i32, E>(e, p, state, frame, rect, header)
    }
}

fn decode_planes<D: LineDecoder>(
    d: &mut D,
    p: &GlobalParams,
    state: &mut SliceState,
    planes: &mut [Plane],
    header: &SliceHeader,
) -> Result<()> {
    if !p.colorspace.is_rgb() {
        decode_ycbcr(d, p, state, planes)
    } else if p.bits_per_raw_sample <= 14 {
        decode_rgb::<i16, D>(d, p, state, planes, header)
    } else {
        decode_rgb::<i32, D>(d, p, state, planes, header)
    }
}

// --- Slices ---

fn encode_body(
    p: &GlobalParams,
    state: &mut SliceState,
    frame: &Frame,
    rect: Rect,
    header: &SliceHeader,
    mut c: RangeEncoder,
    index: usize,
) -> Result<Vec<u8>> {
    let overflow = |capacity| Ffv1Error::Overflow {
        slice: index,
        capacity,
    };
    let capacity = c.capacity();

    if header.coding_mode == CodingMode::Pcm || p.coder.is_range() {
        if header.coding_mode == CodingMode::Pcm {
            encode_planes(&mut PcmLines { c: &mut c }, p, state, frame, rect, header)?;
        } else {
            encode_planes(&mut RangeLines { c: &mut c }, p, state, frame, rect, header)?;
        }
        c.terminate(true);
        if c.overflowed() {
            return Err(overflow(capacity));
        }
        return Ok(c.into_bytes());
    }

    // Golomb-Rice: the range-coded part ends before the first sample. Later
    // slices of versions 0 to 2 have no range-coded part at all.
    let mut out = if p.version > 2 || index == 0 {
        c.terminate(p.golomb_header_sentinel());
        if c.overflowed() {
            return Err(overflow(capacity));
        }
        c.into_bytes()
    } else {
        Vec::new()
    };
    let mut w = BitWriter::new(capacity.saturating_sub(out.len()));
    let mut lines = GolombLines {
        w: &mut w,
        run: RunEncoder::default(),
    };
    encode_planes(&mut lines, p, state, frame, rect, header)?;
    if w.overflowed() {
        return Err(overflow(capacity));
    }
    out.extend_from_slice(&w.finish());
    Ok(out)
}

/// Encodes the slice of `frame` described by `header`.
///
/// `start` is the coder the slice continues: for the first slice it already
/// holds the frame start, for the others it is fresh. Its capacity is the
/// slice's byte budget. A range-coded version 4 slice that overflows it is
/// coded again as PCM.
pub fn encode_slice(
    p: &GlobalParams,
    state: &mut SliceState,
    frame: &Frame,
    mut header: SliceHeader,
    key_frame: bool,
    start: RangeEncoder,
    index: usize,
) -> Result<EncodedSlice> {
    let rect = SliceGrid::of(p).rect(&header.cell, frame.width() as usize, frame.height() as usize);
    if p.colorspace.is_rgb() && p.version > 3 && header.coding_mode == CodingMode::Normal {
        header.rct = choose_rct_params(frame.plane(0), frame.plane(1), frame.plane(2), rect);
    }

    loop {
        let mut c = start.clone();
        state.configure(p, &header.quant_indices)?;
        if key_frame || header.reset_contexts {
            state.reset(p);
        }
        if p.version > 2 {
            header.write(&mut c, p);
        }
        match encode_body(p, state, frame, rect, &header, c, index) {
            Ok(data) => {
                crate::slice_trace!(
                    "slice {} {:?} {}x{} at ({}, {}): {} bytes",
                    index,
                    header.coding_mode,
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y,
                    data.len()
                );
                return Ok(EncodedSlice { data, header });
            }
            Err(Ffv1Error::Overflow { capacity, .. })
                if p.version > 3 && p.coder.is_range() && header.coding_mode == CodingMode::Normal =>
            {
                info!("slice {} exceeds {} bytes, coding it as PCM", index, capacity);
                header.coding_mode = CodingMode::Pcm;
                header.reset_contexts = true;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decodes one slice into buffers covering its rectangle.
///
/// Header and slice-local failures come back as [`Ffv1Error::Damaged`] and
/// mark `state` damaged; allocation failures propagate as they are.
pub fn decode_slice(
    p: &GlobalParams,
    state: &mut SliceState,
    layout: &FrameLayout,
    input: SliceInput<'_>,
    key_frame: bool,
) -> Result<DecodedSlice> {
    let SliceInput {
        index,
        payload,
        mut coder,
        header,
    } = input;

    let header = match header {
        Some(header) => header,
        None => SliceHeader::read(&mut coder, p)
            .map_err(|e| damage(state, index, format!("slice header: {}", e)))?,
    };
    state.configure(p, &header.quant_indices)?;
    if key_frame || header.reset_contexts {
        state.reset(p);
    } else if state.damaged {
        return Err(Ffv1Error::Damaged {
            slice: index,
            reason: "contexts lost on an earlier frame".into(),
        });
    }

    let rect = SliceGrid::of(p).rect(&header.cell, layout.width as usize, layout.height as usize);
    let mut planes: Vec<Plane> = (0..layout.plane_count())
        .map(|i| {
            let r = layout.plane_rect(i, rect);
            Plane::new(r.width as u32, r.height as u32)
        })
        .collect();

    if header.coding_mode == CodingMode::Pcm || p.coder.is_range() {
        if header.coding_mode == CodingMode::Pcm {
            decode_planes(&mut PcmLineSource { c: &mut coder }, p, state, &mut planes, &header)?;
        } else {
            decode_planes(&mut RangeLineSource { c: &mut coder }, p, state, &mut planes, &header)?;
        }
        if coder.is_corrupt() || coder.overread() {
            return Err(damage(state, index, "range coder ran past the payload"));
        }
        if p.has_slice_trailers() {
            let closed = coder.read_sentinel();
            if !closed || coder.bytes_consumed() != payload.len() {
                return Err(damage(
                    state,
                    index,
                    format!("slice ends at byte {} of {}", coder.bytes_consumed(), payload.len()),
                ));
            }
        }
    } else {
        let start = if p.version > 2 || index == 0 {
            if p.golomb_header_sentinel() && !coder.read_sentinel() {
                return Err(damage(state, index, "missing header sentinel"));
            }
            coder.bytes_consumed()
        } else {
            0
        };
        if coder.is_corrupt() || start > payload.len() {
            return Err(damage(state, index, "slice header ran past the payload"));
        }
        let mut r = BitReader::new(&payload[start..]);
        let mut lines = GolombLineSource {
            r: &mut r,
            run: RunDecoder::default(),
        };
        decode_planes(&mut lines, p, state, &mut planes, &header)?;
        if r.overread() {
            return Err(damage(state, index, "bit reader ran past the payload"));
        }
    }

    crate::slice_trace!(
        "slice {} decoded {}x{} at ({}, {})",
        index,
        rect.width,
        rect.height,
        rect.x,
        rect.y
    );
    Ok(DecodedSlice {
        rect,
        planes,
        header,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::params::tests::params;
    use crate::header::params::{ChromaLayout, Coder, Colorspace};

    /// Deterministic noise for tests.
    fn noise(seed: &mut u32) -> u32 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 17;
        *seed ^= *seed << 5;
        *seed
    }

    fn gradient_frame(layout: FrameLayout) -> Frame {
        let max = layout.max_sample() as u32;
        let mut seed = 0x1234_5678;
        let planes = (0..layout.plane_count())
            .map(|i| {
                let (w, h) = layout.plane_size(i);
                Plane::from_fn(w, h, |x, y| {
                    let n = noise(&mut seed) % 4;
                    ((x * 5 + y * 3 + i as u32 * 40 + n) % (max + 1)) as u16
                })
            })
            .collect();
        Frame::from_planes(layout, planes).unwrap()
    }

    fn noise_frame(layout: FrameLayout) -> Frame {
        let max = layout.max_sample() as u32;
        let mut seed = 0x9E37_79B9;
        let planes = (0..layout.plane_count())
            .map(|i| {
                let (w, h) = layout.plane_size(i);
                Plane::from_fn(w, h, |_, _| (noise(&mut seed) % (max + 1)) as u16)
            })
            .collect();
        Frame::from_planes(layout, planes).unwrap()
    }

    fn start_coder(p: &GlobalParams, capacity: usize) -> RangeEncoder {
        let mut c = RangeEncoder::new(capacity);
        c.set_transitions(p.transitions());
        c
    }

    fn input<'a>(p: &GlobalParams, index: usize, payload: &'a [u8]) -> SliceInput<'a> {
        let mut coder = RangeDecoder::new(payload);
        coder.set_transitions(p.transitions());
        SliceInput {
            index,
            payload,
            coder,
            header: None,
        }
    }

    fn encode_whole(p: &GlobalParams, frame: &Frame, capacity: usize) -> Result<EncodedSlice> {
        let header = SliceHeader::new(p, SliceGrid::of(p).cell(0), 0);
        let mut state = SliceState::default();
        encode_slice(p, &mut state, frame, header, true, start_coder(p, capacity), 1)
    }

    /// Codes one whole-frame slice of a version 3 or later stream and decodes it back.
    fn round_trip(p: &GlobalParams, frame: &Frame, capacity: usize) -> (EncodedSlice, DecodedSlice) {
        let encoded = encode_whole(p, frame, capacity).unwrap();
        let mut state = SliceState::default();
        let decoded = decode_slice(p, &mut state, frame.layout(), input(p, 1, &encoded.data), true).unwrap();
        (encoded, decoded)
    }

    #[test]
    fn test_ycbcr_range_slice() {
        let mut p = params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        p.transparency = true;
        let layout = FrameLayout::for_stream(&p, 21, 13);
        let frame = gradient_frame(layout);
        let (_, decoded) = round_trip(&p, &frame, 1 << 16);
        assert_eq!(decoded.rect, Rect::new(0, 0, 21, 13));
        assert_eq!(decoded.planes, frame.planes());
    }

    #[test]
    fn test_ycbcr_golomb_slice() {
        for version in [3, 4] {
            let mut p = params(version, Colorspace::YCbCr(ChromaLayout::YUV422), 8);
            p.coder = Coder::GolombRice;
            let layout = FrameLayout::for_stream(&p, 30, 7);
            let frame = gradient_frame(layout);
            let (_, decoded) = round_trip(&p, &frame, 1 << 16);
            assert_eq!(decoded.planes, frame.planes());
        }
    }

    #[test]
    fn test_rgb_slices_at_both_sample_widths() {
        for bits in [8, 10, 16] {
            let mut p = params(4, Colorspace::Rgb, bits);
            p.transparency = true;
            p.quant_tables = vec![QuantTable::for_model(1, bits)];
            p.initial_states.clear();
            p.fill_default_initial_states().unwrap();
            let layout = FrameLayout::for_stream(&p, 17, 9);
            let frame = gradient_frame(layout);
            let (encoded, decoded) = round_trip(&p, &frame, 1 << 16);
            assert_eq!(encoded.header.coding_mode, CodingMode::Normal);
            assert!(encoded.header.rct.is_valid());
            assert_eq!(decoded.header.rct, encoded.header.rct);
            assert_eq!(decoded.planes, frame.planes(), "{} bits", bits);
        }
    }

    #[test]
    fn test_sixteen_bit_gray() {
        let p = params(4, Colorspace::YCbCr(ChromaLayout::GRAY), 16);
        let layout = FrameLayout::for_stream(&p, 12, 12);
        let frame = noise_frame(layout);
        let (_, decoded) = round_trip(&p, &frame, 1 << 16);
        assert_eq!(decoded.planes, frame.planes());
    }

    #[test]
    fn test_overflow_falls_back_to_pcm() {
        // Transformed noise costs well over 24 bits a pixel, PCM exactly 24.
        let p = params(4, Colorspace::Rgb, 8);
        let layout = FrameLayout::for_stream(&p, 32, 32);
        let frame = noise_frame(layout);
        let (encoded, decoded) = round_trip(&p, &frame, 3150);
        assert_eq!(encoded.header.coding_mode, CodingMode::Pcm);
        assert!(encoded.header.reset_contexts);
        assert!(encoded.data.len() <= 3150);
        assert_eq!(decoded.planes, frame.planes());
    }

    #[test]
    fn test_overflow_without_pcm_is_an_error() {
        let p = params(3, Colorspace::YCbCr(ChromaLayout::GRAY), 8);
        let frame = noise_frame(FrameLayout::for_stream(&p, 32, 32));
        let err = encode_whole(&p, &frame, 100).unwrap_err();
        assert!(matches!(err, Ffv1Error::Overflow { slice: 1, capacity: 100 }));
    }

    #[test]
    fn test_golomb_overflow_is_an_error() {
        let mut p = params(4, Colorspace::Rgb, 8);
        p.coder = Coder::GolombRice;
        let frame = noise_frame(FrameLayout::for_stream(&p, 32, 32));
        let err = encode_whole(&p, &frame, 2500).unwrap_err();
        assert!(matches!(err, Ffv1Error::Overflow { slice: 1, capacity: 2500 }));
    }

    #[test]
    fn test_truncated_slice_is_damaged() {
        let p = params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        let layout = FrameLayout::for_stream(&p, 16, 16);
        let encoded = encode_whole(&p, &gradient_frame(layout), 4096).unwrap();

        let payload = &encoded.data[..encoded.data.len() - 3];
        let mut state = SliceState::default();
        let err = decode_slice(&p, &mut state, &layout, input(&p, 1, payload), true).unwrap_err();
        assert!(matches!(err, Ffv1Error::Damaged { slice: 1, .. }));
        assert!(state.damaged);
    }

    #[test]
    fn test_damage_is_sticky_until_reset() {
        let p = params(3, Colorspace::YCbCr(ChromaLayout::GRAY), 8);
        let layout = FrameLayout::for_stream(&p, 8, 8);
        let frame = gradient_frame(layout);
        let encoded = encode_whole(&p, &frame, 4096).unwrap();

        let mut state = SliceState {
            damaged: true,
            ..SliceState::default()
        };
        let err = decode_slice(&p, &mut state, &layout, input(&p, 1, &encoded.data), false).unwrap_err();
        assert!(matches!(err, Ffv1Error::Damaged { .. }));

        // A key frame resets the contexts and clears the damage.
        let decoded = decode_slice(&p, &mut state, &layout, input(&p, 1, &encoded.data), true).unwrap();
        assert!(!state.damaged);
        assert_eq!(decoded.planes, frame.planes());
    }
}
