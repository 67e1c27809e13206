//! Entropy coding back-ends.
//!
//! - [`range`]: adaptive binary range coder and its state tables ([`states`])
//! - [`symbol`]: integers coded through a 32-state bank on the range coder
//! - [`golomb`] and [`run`]: the Golomb-Rice alternative with run mode

pub mod golomb;
pub mod range;
pub mod run;
pub mod states;
pub mod symbol;

pub use golomb::{BitReader, BitWriter, VlcState};
pub use range::{BitContext, INITIAL_STATE, RangeDecoder, RangeEncoder};
pub use states::StateTransitions;
pub use symbol::{CONTEXT_SIZE, SymbolState, fresh_symbol_state};

/// Sign-extends the low `bits` bits of `d`, wrapping residuals into the
/// range a `bits`-wide sample difference can take.
#[inline]
pub fn fold(d: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    d.wrapping_shl(shift) >> shift
}
