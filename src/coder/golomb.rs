// src/coder/golomb.rs

//! Adaptive Golomb-Rice residual coding.
//!
//! Used by coder type 0 instead of the range coder. Bits are packed
//! MSB-first into a `BitVec`; each context keeps a [`VlcState`] that tracks
//! the mean magnitude (to pick the Rice parameter `k`) and a running bias.

use bitvec::prelude::*;

use super::fold;

/// Escape threshold of the limited Rice code: quotients of 12 or more
/// are sent as 12 zeros followed by a raw `bits`-wide value.
const GOLOMB_LIMIT: u32 = 12;

/// Per-context adaptation state for the Golomb-Rice path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlcState {
    pub drift: i32,
    pub error_sum: i32,
    pub bias: i32,
    pub count: i32,
}

impl Default for VlcState {
    fn default() -> Self {
        Self {
            drift: 0,
            error_sum: 4,
            bias: 0,
            count: 1,
        }
    }
}

impl VlcState {
    /// Rice parameter: smallest `k` with `count << k >= error_sum`.
    #[inline]
    pub fn rice_k(&self) -> u32 {
        let mut i = self.count;
        let mut k = 0;
        while i < self.error_sum {
            k += 1;
            i += i;
        }
        k
    }

    #[inline]
    fn sign_flip(&self) -> i32 {
        (2 * self.drift + self.count) >> 31
    }

    pub fn update(&mut self, v: i32) {
        self.error_sum += v.abs();
        let mut drift = self.drift + v;
        let mut count = self.count;

        if count == 128 {
            count >>= 1;
            drift >>= 1;
            self.error_sum >>= 1;
        }
        count += 1;

        if drift <= -count {
            self.bias = (self.bias - 1).max(-128);
            drift = (drift + count).max(-count + 1);
        } else if drift > 0 {
            self.bias = (self.bias + 1).min(127);
            drift = (drift - count).min(0);
        }

        self.drift = drift;
        self.count = count;
    }
}

/// Bounded MSB-first bit sink.
#[derive(Debug, Clone)]
pub struct BitWriter {
    bits: BitVec<u8, Msb0>,
    capacity_bits: usize,
    overflowed: bool,
}

impl BitWriter {
    pub fn new(capacity_bytes: usize) -> Self {
        let capacity_bits = capacity_bytes.saturating_mul(8);
        Self {
            bits: BitVec::with_capacity(capacity_bits.min(1 << 23)),
            capacity_bits,
            overflowed: false,
        }
    }

    #[inline]
    pub fn put_bit(&mut self, bit: bool) {
        if self.bits.len() < self.capacity_bits {
            self.bits.push(bit);
        } else {
            self.overflowed = true;
        }
    }

    /// Writes the low `n` bits of `value`, most significant first.
    pub fn put_bits(&mut self, n: u32, value: u32) {
        for i in (0..n).rev() {
            self.put_bit((value >> i) & 1 != 0);
        }
    }

    pub fn put_zeros(&mut self, n: u32) {
        for _ in 0..n {
            self.put_bit(false);
        }
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Bytes the stream occupies once padded to a byte boundary.
    pub fn byte_len(&self) -> usize {
        self.bits.len().div_ceil(8)
    }

    /// Zero-pads to a whole byte and returns the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        while self.bits.len() % 8 != 0 {
            self.bits.push(false);
        }
        self.bits.into_vec()
    }

    /// Unsigned limited Rice code with parameter `k`.
    pub fn put_ur_golomb(&mut self, u: u32, k: u32, esc_len: u32) {
        let e = u >> k;
        if e < GOLOMB_LIMIT {
            self.put_zeros(e);
            self.put_bit(true);
            self.put_bits(k, u);
        } else {
            self.put_zeros(GOLOMB_LIMIT);
            self.put_bits(esc_len, u - (GOLOMB_LIMIT - 1));
        }
    }

    /// Signed Rice code: `v` is zig-zag mapped (0, -1, 1, -2, ...) first.
    pub fn put_sr_golomb(&mut self, v: i32, k: u32, esc_len: u32) {
        let u = ((v as u32) << 1) ^ ((v >> 31) as u32);
        self.put_ur_golomb(u, k, esc_len);
    }

    /// Codes one residual in context `state`.
    pub fn put_vlc_symbol(&mut self, state: &mut VlcState, v: i32, bits: u32) {
        let v = fold(v.wrapping_sub(state.bias), bits);
        let k = state.rice_k();
        let code = v ^ state.sign_flip();
        self.put_sr_golomb(code, k, bits);
        state.update(v);
    }
}

/// MSB-first bit source over a byte slice.
///
/// Reads past the end yield zeros and set the overread flag, so a truncated
/// slice decodes to something and is then reported as damaged.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
    overread: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            bits: data.view_bits::<Msb0>(),
            pos: 0,
            overread: false,
        }
    }

    #[inline]
    pub fn get_bit(&mut self) -> bool {
        let bit = match self.bits.get(self.pos) {
            Some(b) => *b,
            None => {
                self.overread = true;
                false
            }
        };
        self.pos += 1;
        bit
    }

    pub fn get_bits(&mut self, n: u32) -> u32 {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.get_bit() as u32;
        }
        v
    }

    pub fn bits_consumed(&self) -> usize {
        self.pos
    }

    pub fn overread(&self) -> bool {
        self.overread
    }

    pub fn get_ur_golomb(&mut self, k: u32, esc_len: u32) -> u32 {
        let mut zeros = 0;
        while zeros < GOLOMB_LIMIT {
            if self.get_bit() {
                return (zeros << k).wrapping_add(self.get_bits(k));
            }
            zeros += 1;
            if self.overread {
                return 0;
            }
        }
        self.get_bits(esc_len).wrapping_add(GOLOMB_LIMIT - 1)
    }

    pub fn get_sr_golomb(&mut self, k: u32, esc_len: u32) -> i32 {
        let u = self.get_ur_golomb(k, esc_len);
        ((u >> 1) as i32) ^ -((u & 1) as i32)
    }

    pub fn get_vlc_symbol(&mut self, state: &mut VlcState, bits: u32) -> i32 {
        let k = state.rice_k();
        let mut v = self.get_sr_golomb(k, bits);
        v ^= state.sign_flip();
        let out = fold(v.wrapping_add(state.bias), bits);
        state.update(v);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rice_codes_decode_back() {
        let mut w = BitWriter::new(1024);
        let cases = [(0u32, 0u32), (1, 0), (5, 2), (11, 0), (12, 0), (300, 3), (65_000, 1)];
        for &(u, k) in &cases {
            w.put_ur_golomb(u, k, 17);
        }
        for v in [-3i32, 0, 7, -70_000, 65_535] {
            w.put_sr_golomb(v, 2, 18);
        }
        let data = w.finish();

        let mut r = BitReader::new(&data);
        for &(u, k) in &cases {
            assert_eq!(r.get_ur_golomb(k, 17), u);
        }
        for v in [-3i32, 0, 7, -70_000, 65_535] {
            assert_eq!(r.get_sr_golomb(2, 18), v);
        }
        assert!(!r.overread());
    }

    #[test]
    fn test_vlc_symbols_track_state() {
        let values: Vec<i32> = (0..2000).map(|i| ((i * 37) % 61) - 30).collect();
        let mut w = BitWriter::new(1 << 16);
        let mut enc_state = VlcState::default();
        for &v in &values {
            w.put_vlc_symbol(&mut enc_state, v, 9);
        }
        let data = w.finish();

        let mut r = BitReader::new(&data);
        let mut dec_state = VlcState::default();
        for &v in &values {
            assert_eq!(r.get_vlc_symbol(&mut dec_state, 9), v);
        }
        assert_eq!(enc_state, dec_state);
    }

    #[test]
    fn test_vlc_state_stays_bounded() {
        let mut state = VlcState::default();
        for i in 0..100_000 {
            let v = if i % 3 == 0 { -255 } else { 200 - (i % 400) };
            state.update(v);
            assert!((-128..=127).contains(&state.bias));
            assert!((1..=128).contains(&state.count));
            assert!(state.drift <= 0 && state.drift > -state.count);
        }
    }

    #[test]
    fn test_writer_capacity_and_padding() {
        let mut w = BitWriter::new(1);
        w.put_bits(3, 0b101);
        assert_eq!(w.byte_len(), 1);
        w.put_bits(9, 0x1FF);
        assert!(w.overflowed());
        assert_eq!(w.finish(), vec![0b1011_1111]);
    }

    #[test]
    fn test_reader_past_end_is_flagged() {
        let mut r = BitReader::new(&[0x00]);
        assert_eq!(r.get_ur_golomb(0, 8), 0);
        assert!(r.overread());
    }
}
