// src/utils/error.rs

use thiserror::Error;

/// The primary error type for all operations in the FFV1 codec library.
#[derive(Error, Debug)]
pub enum Ffv1Error {
    /// An I/O error while writing or reading trailer fields.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header or packet: bad CRC, out-of-range field, broken slice chain.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The stream uses a version, colorspace or depth this library does not implement.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Allocation of per-slice state failed.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// A single slice failed its CRC or overran its byte range.
    #[error("Slice {slice} damaged: {reason}")]
    Damaged { slice: usize, reason: String },

    /// A slice's coded output does not fit its byte budget.
    #[error("Slice {slice} does not fit its {capacity} byte budget")]
    Overflow { slice: usize, capacity: usize },

    /// An invalid argument was provided, usually an encoder setting.
    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    /// Occurs when frame dimensions do not match the configured dimensions.
    #[error("Dimension mismatch: expected ({}, {}), but got ({}, {})", .expected.0, .expected.1, .actual.0, .actual.1)]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl Ffv1Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Ffv1Error::InvalidData(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Ffv1Error::Unsupported(msg.into())
    }

    /// Slice-local failures are recoverable; everything else aborts the frame.
    pub fn is_slice_local(&self) -> bool {
        matches!(self, Ffv1Error::Damaged { .. } | Ffv1Error::Overflow { .. })
    }
}

impl From<std::collections::TryReserveError> for Ffv1Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Ffv1Error::OutOfMemory(err.to_string())
    }
}

/// A specialized `Result` type for FFV1 operations.
pub type Result<T> = std::result::Result<T, Ffv1Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Ffv1Error::Overflow { slice: 3, capacity: 128 };
        assert_eq!(err.to_string(), "Slice 3 does not fit its 128 byte budget");

        let err = Ffv1Error::DimensionMismatch {
            expected: (16, 16),
            actual: (8, 16),
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected (16, 16), but got (8, 16)"
        );
    }

    #[test]
    fn test_slice_local_classification() {
        assert!(Ffv1Error::Damaged { slice: 0, reason: "crc".into() }.is_slice_local());
        assert!(!Ffv1Error::invalid("bad version").is_slice_local());
    }

    #[test]
    fn test_try_reserve_maps_to_oom() {
        let mut v: Vec<u8> = Vec::new();
        let err: Ffv1Error = v.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert!(matches!(err, Ffv1Error::OutOfMemory(_)));
    }
}
