// src/coder/range.rs

//! Adaptive binary range coder.
//!
//! The encoder keeps a 16-bit window (`low`, `range`) and emits a byte each
//! time `range` drops below 0x100. A byte that may still receive a carry is
//! held back in `outstanding_byte`, followed by a count of 0xFF bytes that
//! would ripple with it. Termination flushes the held byte, so a payload
//! decodes the same whatever bytes follow it.

use super::states::StateTransitions;

/// Binary decision state: the probability of a one, in 1/256 units.
pub type BitContext = u8;

/// Fresh decision state.
pub const INITIAL_STATE: BitContext = 128;

/// Smallest output bound accepted by the encoder.
const MIN_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct RangeEncoder {
    low: u32,
    range: u32,
    outstanding_count: u32,
    outstanding_byte: i32,
    out: Vec<u8>,
    capacity: usize,
    overflowed: bool,
    transitions: StateTransitions,
}

impl RangeEncoder {
    /// Creates an encoder whose output is bounded to `capacity` bytes.
    ///
    /// Writing past the bound does not panic; bytes are dropped and
    /// [`overflowed`](Self::overflowed) reports the condition.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            low: 0,
            range: 0xFF00,
            outstanding_count: 0,
            outstanding_byte: -1,
            out: Vec::with_capacity(capacity.min(1 << 20)),
            capacity,
            overflowed: false,
            transitions: StateTransitions::default(),
        }
    }

    pub fn transitions(&self) -> &StateTransitions {
        &self.transitions
    }

    pub fn set_transitions(&mut self, transitions: StateTransitions) {
        self.transitions = transitions;
    }

    #[inline]
    pub fn put_bit(&mut self, state: &mut BitContext, bit: bool) {
        debug_assert!(*state != 0);
        let range1 = (self.range * *state as u32) >> 8;
        if !bit {
            self.range -= range1;
            *state = self.transitions.zero_state[*state as usize];
        } else {
            self.low += self.range - range1;
            self.range = range1;
            *state = self.transitions.one_state[*state as usize];
        }
        self.renorm();
    }

    fn renorm(&mut self) {
        while self.range < 0x100 {
            if self.outstanding_byte < 0 {
                self.outstanding_byte = (self.low >> 8) as i32;
            } else if self.low <= 0xFF00 {
                self.emit(self.outstanding_byte as u8);
                for _ in 0..self.outstanding_count {
                    self.emit(0xFF);
                }
                self.outstanding_count = 0;
                self.outstanding_byte = (self.low >> 8) as i32;
            } else if self.low >= 0x10000 {
                self.emit((self.outstanding_byte + 1) as u8);
                for _ in 0..self.outstanding_count {
                    self.emit(0x00);
                }
                self.outstanding_count = 0;
                self.outstanding_byte = (self.low >> 8) as i32 - 0x100;
            } else {
                self.outstanding_count += 1;
            }
            self.low = (self.low & 0xFF) << 8;
            self.range <<= 8;
        }
    }

    #[inline]
    fn emit(&mut self, byte: u8) {
        if self.out.len() < self.capacity {
            self.out.push(byte);
        } else {
            self.overflowed = true;
        }
    }

    /// Flushes the coder. With `sentinel` a final zero decision on a
    /// throw-away state of 129 is coded first, which lets a decoder check
    /// that it stopped exactly at the end of the payload.
    ///
    /// Returns the number of bytes written.
    pub fn terminate(&mut self, sentinel: bool) -> usize {
        if sentinel {
            let mut state: BitContext = 129;
            self.put_bit(&mut state, false);
        }
        self.range = 0xFF;
        self.low += 0xFF;
        self.renorm();
        self.range = 0xFF;
        self.renorm();
        if self.outstanding_byte >= 0 {
            self.emit(self.outstanding_byte as u8);
            for _ in 0..self.outstanding_count {
                self.emit(0xFF);
            }
            self.outstanding_count = 0;
            self.outstanding_byte = -1;
        }
        self.out.len()
    }

    /// Bytes emitted so far.
    pub fn bytes_written(&self) -> usize {
        self.out.len()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

#[derive(Debug, Clone)]
pub struct RangeDecoder<'a> {
    data: &'a [u8],
    end: usize,
    // Virtual read position; keeps counting once the input is exhausted.
    pos: usize,
    low: u32,
    range: u32,
    overread: usize,
    corrupt: bool,
    transitions: StateTransitions,
}

impl<'a> RangeDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut dec = Self {
            data,
            end: data.len(),
            pos: 0,
            low: 0,
            range: 0xFF00,
            overread: 0,
            corrupt: false,
            transitions: StateTransitions::default(),
        };
        let hi = dec.next_byte() as u32;
        let lo = dec.next_byte() as u32;
        dec.low = (hi << 8) | lo;
        if dec.low >= 0xFF00 {
            dec.low = 0xFF00;
            dec.end = dec.end.min(dec.pos);
        }
        dec
    }

    pub fn set_transitions(&mut self, transitions: StateTransitions) {
        self.transitions = transitions;
    }

    /// Restricts further reads to the first `end` bytes of the buffer.
    pub fn truncate(&mut self, end: usize) {
        self.end = self.end.min(end);
    }

    #[inline]
    fn next_byte(&mut self) -> u8 {
        let byte = if self.pos < self.end {
            self.data[self.pos]
        } else {
            self.overread += 1;
            0
        };
        self.pos += 1;
        byte
    }

    #[inline]
    fn refill(&mut self) {
        if self.range < 0x100 {
            self.range <<= 8;
            // `low` only leaves its window on corrupt input.
            self.low = (self.low << 8).wrapping_add(self.next_byte() as u32);
        }
    }

    #[inline]
    pub fn get_bit(&mut self, state: &mut BitContext) -> bool {
        let range1 = (self.range * *state as u32) >> 8;
        self.range -= range1;
        if self.low < self.range {
            *state = self.transitions.zero_state[*state as usize];
            self.refill();
            false
        } else {
            self.low -= self.range;
            self.range = range1;
            *state = self.transitions.one_state[*state as usize];
            self.refill();
            true
        }
    }

    /// Reads the terminating sentinel written by `terminate(true)`.
    pub fn read_sentinel(&mut self) -> bool {
        let mut state: BitContext = 129;
        !self.get_bit(&mut state)
    }

    /// Bytes of the buffer covered by the decisions read so far; equals the
    /// encoder's output length once the last coded decision is read back.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// True once the decoder had to invent bytes past the end of its input.
    pub fn overread(&self) -> bool {
        self.overread > 0
    }

    pub(crate) fn mark_corrupt(&mut self) {
        self.corrupt = true;
    }

    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }
}
