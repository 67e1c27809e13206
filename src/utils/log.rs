// src/utils/log.rs

//! Logging for the FFV1 library.
//!
//! The codec only talks to the `log` facade; installing a logger
//! (`env_logger`, `simple_logger`, ...) is left to the application.
//!
//! Per-slice diagnostics are noisy, so they go through [`slice_trace!`],
//! which expands to `log::trace!` only when the `slice-trace` feature is
//! enabled and to nothing otherwise.
//!
//! ```ignore
//! use ffv1::utils::log::debug;
//! debug!("slice {} decoded in {} bytes", index, used);
//! ```

pub use log::{debug, error, info, trace, warn, Level};

/// Traces per-slice/per-plane events when the `slice-trace` feature is on.
#[macro_export]
macro_rules! slice_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "slice-trace")]
        {
            ::log::trace!(target: "ffv1::slice", $($arg)*);
        }
    };
}

/// Returns true when verbose slice tracing is compiled in and enabled.
pub fn slice_trace_enabled() -> bool {
    cfg!(feature = "slice-trace") && log::log_enabled!(target: "ffv1::slice", Level::Trace)
}
