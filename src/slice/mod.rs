//! Slice layer: grid geometry, line buffers, the colour transform, the
//! per-slice adaptive state and the slice encoder/decoder built on them.

pub mod codec;
pub mod geometry;
pub mod line;
pub mod rct;
pub mod sample;
pub mod state;

pub use codec::{DecodedSlice, EncodedSlice, SliceInput, decode_slice, encode_slice};
pub use geometry::{GridCell, SliceGrid, choose_grid};
pub use rct::RctCoefficients;
pub use state::SliceState;
