//! Stream-level encoder and decoder: settings, slice framing and the
//! per-frame orchestration of the slice jobs.

pub mod config;
pub mod decoder;
pub mod encoder;
mod executor;
pub mod packet;

pub use config::{DecoderConfig, EncoderConfig, SliceRequest};
pub use decoder::{DecodedFrame, Decoder};
pub use encoder::Encoder;
pub use packet::SliceSpan;
