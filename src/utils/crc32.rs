//! CRC-32 used by the extradata and slice trailers.
//!
//! Polynomial 0x04C11DB7, processed MSB first without reflection and without
//! a final XOR. The checksum is stored big-endian after the protected bytes,
//! which makes the CRC of "data followed by its stored CRC" equal to the seed.

/// CRC32 lookup table (polynomial 0x04C11DB7, MSB first)
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Seed and output XOR of the seeded error-check mode (`ec == 2`).
pub const SEEDED_CRC_INIT: u32 = 0x7940_8C7A;
pub const SEEDED_CRC_XOR: u32 = 0x9681_D88C;

/// Continue a CRC over `data` from the register value `crc`.
pub fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let index = ((crc >> 24) ^ byte as u32) as usize;
        crc = (crc << 8) ^ CRC32_TABLE[index];
    }
    crc
}

/// CRC of `data` with a zero seed.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

/// Seed/XOR pair selected by the stream's error-check mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcParams {
    pub seed: u32,
    pub xor: u32,
}

impl CrcParams {
    pub const PLAIN: CrcParams = CrcParams { seed: 0, xor: 0 };
    pub const SEEDED: CrcParams = CrcParams {
        seed: SEEDED_CRC_INIT,
        xor: SEEDED_CRC_XOR,
    };

    /// Parameters for an error-check mode as transmitted in the header.
    pub fn for_mode(ec: u32) -> Self {
        if ec >= 2 { Self::SEEDED } else { Self::PLAIN }
    }

    /// Value to append (big-endian) after `data`.
    pub fn checksum(&self, data: &[u8]) -> u32 {
        crc32_update(self.seed, data) ^ self.xor
    }

    /// True when `data` ends with a valid stored checksum.
    pub fn verify(&self, data_with_crc: &[u8]) -> bool {
        data_with_crc.len() >= 4 && crc32_update(self.seed, data_with_crc) == self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_known_values() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32(b"123456789"), 0x89A1_897F);
    }

    #[test]
    fn test_stored_crc_closes_to_seed() {
        let data = b"ffv1 slice payload";
        for params in [CrcParams::PLAIN, CrcParams::SEEDED] {
            let mut buf = data.to_vec();
            buf.extend_from_slice(&params.checksum(data).to_be_bytes());
            assert!(params.verify(&buf));
            buf[3] ^= 0x40;
            assert!(!params.verify(&buf));
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(CrcParams::for_mode(1), CrcParams::PLAIN);
        assert_eq!(CrcParams::for_mode(2), CrcParams::SEEDED);
    }
}
