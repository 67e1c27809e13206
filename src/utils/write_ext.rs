//! Writing the 24-bit size field that closes every sized slice.

use byteorder::{BigEndian, ByteOrder};
use std::io::{self, Write};

/// Largest payload a 24-bit size field can describe.
pub const MAX_SIZE_FIELD: usize = 0xFF_FFFF;

pub trait WriteSliceSizeExt: Write {
    /// Writes `len` as a big-endian 24-bit slice size.
    fn write_slice_size(&mut self, len: usize) -> io::Result<()>;
}

impl<W: Write> WriteSliceSizeExt for W {
    fn write_slice_size(&mut self, len: usize) -> io::Result<()> {
        if len > MAX_SIZE_FIELD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("slice of {} bytes has no 24-bit size", len),
            ));
        }
        let mut field = [0; 3];
        BigEndian::write_u24(&mut field, len as u32);
        self.write_all(&field)
    }
}
