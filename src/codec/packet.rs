// src/codec/packet.rs

//! Slice framing inside a packet.
//!
//! Slices are stored back to back. Each one except the first slice of a
//! version 0 to 2 stream is followed by a trailer:
//!
//! ```text
//! payload | size (u24 BE) | [ 0x00 | crc32 (u32 BE) ]   (CRC part when error checking is on)
//! ```
//!
//! The sizes let a decoder find every slice by walking backwards from the
//! end of the packet. The CRC covers the payload and the trailer bytes
//! before it.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::header::params::{GlobalParams, MAX_SLICES};
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::warn;
use crate::utils::write_ext::{MAX_SIZE_FIELD, WriteSliceSizeExt};

const SIZE_BYTES: usize = 3;
const CRC_BYTES: usize = 5;

/// Position of one slice payload in a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpan {
    pub offset: usize,
    pub len: usize,
    /// False when the slice carries a CRC that does not match.
    pub crc_ok: bool,
}

fn has_size(p: &GlobalParams, index: usize) -> bool {
    p.has_slice_trailers() || index > 0
}

fn trailer_len(p: &GlobalParams) -> usize {
    let crc = p.has_slice_trailers() && p.error_check.enabled();
    SIZE_BYTES + if crc { CRC_BYTES } else { 0 }
}

/// Appends slice `index` and its trailer to `out`.
pub fn write_slice(out: &mut Vec<u8>, payload: &[u8], index: usize, p: &GlobalParams) -> Result<()> {
    if payload.len() > MAX_SIZE_FIELD {
        return Err(Ffv1Error::Overflow {
            slice: index,
            capacity: MAX_SIZE_FIELD,
        });
    }
    let start = out.len();
    out.try_reserve(payload.len() + SIZE_BYTES + CRC_BYTES)?;
    out.extend_from_slice(payload);
    if has_size(p, index) {
        out.write_slice_size(payload.len())?;
    }
    if p.has_slice_trailers() && p.error_check.enabled() {
        out.push(0);
        let crc = p.error_check.crc().checksum(&out[start..]);
        out.write_u32::<BigEndian>(crc)?;
    }
    Ok(())
}

/// Finds the slices of `packet`, first slice first.
///
/// Version 3 and later streams size every slice, so the count follows from
/// the trailers. Older streams announce `inband_count` in the frame header
/// and leave the first slice unsized.
pub fn locate_slices(
    packet: &[u8],
    p: &GlobalParams,
    inband_count: Option<usize>,
    max_slices: usize,
) -> Result<Vec<SliceSpan>> {
    let trailer = trailer_len(p);
    let check = p.has_slice_trailers() && p.error_check.enabled();
    let crc = p.error_check.crc();
    let limit = max_slices.clamp(1, MAX_SLICES);
    let mut spans = Vec::new();
    let mut end = packet.len();

    let sized = |end: usize, index: usize| -> Result<SliceSpan> {
        if trailer > end {
            return Err(Ffv1Error::invalid(format!("slice {} trailer outside the packet", index)));
        }
        let len = BigEndian::read_u24(&packet[end - trailer..]) as usize;
        if len + trailer > end {
            return Err(Ffv1Error::invalid(format!(
                "slice {} of {} bytes in {} remaining",
                index, len, end
            )));
        }
        let offset = end - trailer - len;
        let crc_ok = !check || crc.verify(&packet[offset..end]);
        Ok(SliceSpan { offset, len, crc_ok })
    };

    if p.has_slice_trailers() {
        while trailer < end {
            let len = BigEndian::read_u24(&packet[end - trailer..]) as usize;
            if len + trailer > end {
                break;
            }
            if spans.len() == limit {
                return Err(Ffv1Error::invalid(format!(
                    "more than {} slices in a packet",
                    limit
                )));
            }
            let span = sized(end, spans.len())?;
            end = span.offset;
            spans.push(span);
        }
        if end != 0 || spans.is_empty() {
            return Err(Ffv1Error::invalid(format!(
                "broken slice chain: {} bytes left before {} slices",
                end,
                spans.len()
            )));
        }
    } else {
        let count = inband_count.unwrap_or(1);
        if count == 0 || count > limit {
            return Err(Ffv1Error::invalid(format!("{} slices announced", count)));
        }
        for index in (1..count).rev() {
            let span = sized(end, index)?;
            end = span.offset;
            spans.push(span);
        }
        spans.push(SliceSpan {
            offset: 0,
            len: end,
            crc_ok: true,
        });
    }

    spans.reverse();
    let bad = spans.iter().filter(|s| !s.crc_ok).count();
    if bad > 0 {
        warn!("{} of {} slices failed their CRC", bad, spans.len());
    }
    Ok(spans)
}
