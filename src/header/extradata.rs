// src/header/extradata.rs

//! The out-of-band global header of version 2 and later streams.
//!
//! Everything is range coded with the default transition table through one
//! shared [`SymbolState`]. Version 3 and later append a big-endian CRC-32 so
//! that the CRC over the whole blob closes to the error-check seed.

use byteorder::{BigEndian, ByteOrder};

use super::params::{Coder, ErrorCheck, GlobalParams};
use crate::coder::{
    CONTEXT_SIZE, INITIAL_STATE, RangeDecoder, RangeEncoder, StateTransitions, SymbolState,
    fresh_symbol_state,
};
use crate::model::{MAX_QUANT_TABLES, QuantTable};
use crate::utils::error::{Ffv1Error, Result};
use crate::utils::log::debug;

/// Worst case: two tables plus initial states for the largest built-in context set.
const EXTRADATA_CAPACITY: usize = 10_000 + 4 + (11 * 11 * 5 * 5 * 5 + 11 * 11 * 11) * 32;

/// Feature gates on `version << 16 | micro_version`.
const INTRA_FLAG_SINCE: u32 = 0x3_0003;
const FLOAT_FLAG_SINCE: u32 = 0x4_0004;

fn has_custom_states(states: &[SymbolState]) -> bool {
    states
        .iter()
        .any(|row| row.iter().any(|&s| s != INITIAL_STATE))
}

/// Serialises the global header.
pub fn write_extradata(p: &GlobalParams) -> Result<Vec<u8>> {
    if p.version < 2 {
        return Err(Ffv1Error::InvalidArg(format!(
            "version {} streams carry no global header",
            p.version
        )));
    }
    let mut c = RangeEncoder::new(EXTRADATA_CAPACITY);
    let mut state = fresh_symbol_state();

    c.put_unsigned(&mut state, p.version);
    if p.version > 2 {
        c.put_unsigned(&mut state, p.micro_version);
    }
    write_coder(&mut c, &mut state, p);
    c.put_unsigned(&mut state, p.colorspace.to_wire());
    c.put_unsigned(&mut state, p.bits_per_raw_sample);
    c.put_bit(&mut state[0], p.chroma_planes());
    c.put_unsigned(&mut state, p.h_shift());
    c.put_unsigned(&mut state, p.v_shift());
    c.put_bit(&mut state[0], p.transparency);
    c.put_unsigned(&mut state, (p.num_h_slices - 1) as u32);
    c.put_unsigned(&mut state, (p.num_v_slices - 1) as u32);

    c.put_unsigned(&mut state, p.quant_tables.len() as u32);
    for table in &p.quant_tables {
        table.write(&mut c);
    }

    for (i, table) in p.quant_tables.iter().enumerate() {
        match p.initial_states.get(i) {
            Some(states) if states.len() >= table.context_count && has_custom_states(states) => {
                c.put_bit(&mut state[0], true);
                write_initial_states(&mut c, &states[..table.context_count]);
            }
            _ => c.put_bit(&mut state[0], false),
        }
    }

    if p.version > 2 {
        c.put_unsigned(&mut state, p.error_check.to_wire());
        if p.combined_version() >= INTRA_FLAG_SINCE {
            c.put_unsigned(&mut state, p.intra as u32);
        }
        if p.combined_version() >= FLOAT_FLAG_SINCE {
            c.put_unsigned(&mut state, 0);
        }
    }

    c.terminate(false);
    if c.overflowed() {
        return Err(Ffv1Error::InvalidArg(format!(
            "global header exceeds {} bytes",
            c.capacity()
        )));
    }
    // Written for every version; version 2 readers skip it.
    let mut out = c.into_bytes();
    let mut tail = [0u8; 4];
    BigEndian::write_u32(&mut tail, p.error_check.crc().checksum(&out));
    out.extend_from_slice(&tail);
    debug!(
        "global header v{}.{}: {} bytes, {} quant tables",
        p.version,
        p.micro_version,
        out.len(),
        p.quant_tables.len()
    );
    Ok(out)
}

/// Coder type, followed by the one-state table deltas for coder type 2.
pub(crate) fn write_coder(c: &mut RangeEncoder, state: &mut SymbolState, p: &GlobalParams) {
    c.put_unsigned(state, p.coder.to_wire());
    if p.coder == Coder::RangeCustom {
        let table = p.state_table.unwrap_or(crate::coder::states::VERSION2_STATE);
        for delta in StateTransitions::deltas_against_default(&table) {
            c.put_symbol(state, delta, true);
        }
    }
}

pub(crate) fn read_coder(
    c: &mut RangeDecoder<'_>,
    state: &mut SymbolState,
) -> Result<(Coder, Option<[u8; 256]>)> {
    let coder = Coder::from_wire(c.get_unsigned(state))?;
    if coder != Coder::RangeCustom {
        return Ok((coder, None));
    }
    let deltas: Vec<i32> = (1..256).map(|_| c.get_symbol(state, true)).collect();
    if c.is_corrupt() {
        return Err(Ffv1Error::invalid("corrupt state transition table"));
    }
    Ok((coder, Some(StateTransitions::table_from_deltas(&deltas)?)))
}

/// Each row is coded against the previous one (the first against 128), one
/// shared symbol state per row position.
fn write_initial_states(c: &mut RangeEncoder, states: &[SymbolState]) {
    let mut per_position = [fresh_symbol_state(); CONTEXT_SIZE];
    let mut pred = [INITIAL_STATE; CONTEXT_SIZE];
    for row in states {
        for k in 0..CONTEXT_SIZE {
            let delta = row[k].wrapping_sub(pred[k]) as i8;
            c.put_symbol(&mut per_position[k], delta as i32, true);
        }
        pred = *row;
    }
}

fn read_initial_states(c: &mut RangeDecoder<'_>, count: usize) -> Result<Vec<SymbolState>> {
    let mut per_position = [fresh_symbol_state(); CONTEXT_SIZE];
    let mut states = Vec::new();
    states.try_reserve_exact(count)?;
    let mut pred = [INITIAL_STATE; CONTEXT_SIZE];
    for _ in 0..count {
        let mut row = [0u8; CONTEXT_SIZE];
        for k in 0..CONTEXT_SIZE {
            let delta = c.get_symbol(&mut per_position[k], true);
            row[k] = (pred[k] as i32).wrapping_add(delta) as u8;
            if row[k] == 0 {
                return Err(Ffv1Error::invalid("initial context state of zero"));
            }
        }
        states.push(row);
        pred = row;
    }
    Ok(states)
}

/// Parses and validates a global header against the frame size.
pub fn read_extradata(data: &[u8], width: u32, height: u32) -> Result<GlobalParams> {
    let mut c = RangeDecoder::new(data);
    let mut state = fresh_symbol_state();

    let version = c.get_unsigned(&mut state);
    if version < 2 {
        return Err(Ffv1Error::invalid(format!(
            "version {} in global header",
            version
        )));
    }
    if version > super::params::MAX_VERSION {
        return Err(Ffv1Error::unsupported(format!("version {}", version)));
    }
    if version > 2 {
        if data.len() < 4 {
            return Err(Ffv1Error::invalid("global header too short for its CRC"));
        }
        c.truncate(data.len() - 4);
    }
    let micro_version = if version > 2 {
        c.get_unsigned(&mut state)
    } else {
        0
    };

    let (coder, state_table) = read_coder(&mut c, &mut state)?;
    let colorspace = c.get_unsigned(&mut state);
    let bits = c.get_unsigned(&mut state);
    let chroma_planes = c.get_bit(&mut state[0]);
    let h_shift = c.get_unsigned(&mut state);
    let v_shift = c.get_unsigned(&mut state);
    let transparency = c.get_bit(&mut state[0]);
    let num_h_slices = c.get_unsigned(&mut state) as usize + 1;
    let num_v_slices = c.get_unsigned(&mut state) as usize + 1;

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
    p.micro_version = micro_version;
    p.num_h_slices = num_h_slices;
    p.num_v_slices = num_v_slices;

    let table_count = c.get_unsigned(&mut state) as usize;
    if table_count == 0 || table_count > MAX_QUANT_TABLES {
        return Err(Ffv1Error::invalid(format!(
            "{} quantisation tables",
            table_count
        )));
    }
    for _ in 0..table_count {
        p.quant_tables.push(QuantTable::read(&mut c)?);
    }

    for i in 0..table_count {
        let count = p.quant_tables[i].context_count;
        if c.get_bit(&mut state[0]) {
            p.initial_states.push(read_initial_states(&mut c, count)?);
        } else {
            let mut neutral = Vec::new();
            neutral.try_reserve_exact(count)?;
            neutral.resize(count, fresh_symbol_state());
            p.initial_states.push(neutral);
        }
    }

    if version > 2 {
        p.error_check = ErrorCheck::from_wire(c.get_unsigned(&mut state))?;
        if p.combined_version() >= INTRA_FLAG_SINCE {
            p.intra = c.get_unsigned(&mut state) != 0;
        }
        if p.combined_version() >= FLOAT_FLAG_SINCE && c.get_unsigned(&mut state) != 0 {
            return Err(Ffv1Error::unsupported("floating point samples"));
        }
    }

    if c.is_corrupt() {
        return Err(Ffv1Error::invalid("corrupt global header"));
    }
    if version > 2 && !p.error_check.crc().verify(data) {
        return Err(Ffv1Error::invalid("global header CRC mismatch"));
    }

    p.validate(width, height)?;
    debug!(
        "global header v{}.{}: coder {:?}, {:?}, {} bits, {}x{} slices, ec {:?}",
        p.version,
        p.micro_version,
        p.coder,
        p.colorspace,
        p.bits_per_raw_sample,
        p.num_h_slices,
        p.num_v_slices,
        p.error_check
    );
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::params::tests::params;
    use crate::header::params::{ChromaLayout, Colorspace};

    fn sample_params() -> GlobalParams {
        let mut p = params(3, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        p.quant_tables.push(QuantTable::for_model(1, 8));
        p.fill_default_initial_states().unwrap();
        p.num_h_slices = 2;
        p.num_v_slices = 2;
        p.error_check = ErrorCheck::Crc;
        p.intra = true;
        p
    }

    #[test]
    fn test_global_header_survives_the_wire() {
        let p = sample_params();
        let data = write_extradata(&p).unwrap();
        let back = read_extradata(&data, 64, 48).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_custom_table_and_initial_states() {
        let mut p = params(4, Colorspace::Rgb, 10);
        p.coder = Coder::RangeCustom;
        p.state_table = Some(crate::coder::states::VERSION2_STATE);
        p.error_check = ErrorCheck::SeededCrc;
        for (j, row) in p.initial_states[0].iter_mut().enumerate() {
            for (k, s) in row.iter_mut().enumerate() {
                *s = (1 + (j * 7 + k * 13) % 255) as u8;
            }
        }
        let data = write_extradata(&p).unwrap();
        let back = read_extradata(&data, 32, 32).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.transitions(), p.transitions());
    }

    #[test]
    fn test_corrupted_crc_is_invalid_data() {
        let p = sample_params();
        let mut data = write_extradata(&p).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(matches!(
            read_extradata(&data, 64, 48),
            Err(Ffv1Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_version_two_ignores_the_crc_tail() {
        let mut p = params(2, Colorspace::YCbCr(ChromaLayout::YUV444), 8);
        p.micro_version = 0;
        let data = write_extradata(&p).unwrap();
        assert_eq!(read_extradata(&data, 16, 16).unwrap(), p);

        // Headers without the tail, or with a tail that does not match,
        // still parse.
        assert_eq!(read_extradata(&data[..data.len() - 4], 16, 16).unwrap(), p);
        let mut bad_tail = data.clone();
        let last = bad_tail.len() - 1;
        bad_tail[last] ^= 0xFF;
        assert_eq!(read_extradata(&bad_tail, 16, 16).unwrap(), p);
    }

    #[test]
    fn test_rejects_oversized_grid_and_old_versions() {
        let mut p = sample_params();
        p.num_h_slices = 9;
        let data = write_extradata(&p).unwrap();
        assert!(matches!(
            read_extradata(&data, 8, 48),
            Err(Ffv1Error::InvalidData(_))
        ));

        let v1 = params(1, Colorspace::YCbCr(ChromaLayout::YUV420), 8);
        assert!(write_extradata(&v1).is_err());
    }

    #[test]
    fn test_truncated_header_fails_cleanly() {
        let p = sample_params();
        let data = write_extradata(&p).unwrap();
        for len in [0usize, 1, 3, 7, data.len() / 2] {
            assert!(read_extradata(&data[..len], 64, 48).is_err());
        }
    }
}
