//! A lossless intra-frame video codec implementing FFV1 (RFC 9043),
//! bitstream versions 0 to 4.
//!
//! Frames are cut into a grid of slices. Each slice predicts its samples
//! from their neighbours and codes the residuals with an adaptive binary
//! range coder or with Golomb-Rice codes, so slices can be coded in
//! parallel and a damaged slice does not take the rest of the frame down.
//!
//! # Quick Start
//!
//! ```ignore
//! use ffv1::{ChromaLayout, Decoder, DecoderConfig, Encoder, EncoderConfig, Frame, FrameLayout};
//!
//! let layout = FrameLayout::yuv(1920, 1080, ChromaLayout::YUV420, 10);
//! let mut encoder = Encoder::new(
//!     EncoderConfig::new(layout)
//!         .with_version(3)
//!         .with_context_model(1)
//!         .with_slices(16),
//! )?;
//!
//! let mut config = DecoderConfig::new(1920, 1080);
//! if let Some(extradata) = encoder.extradata() {
//!     config = config.with_extradata(extradata);
//! }
//! let mut decoder = Decoder::new(config)?;
//!
//! let frame = Frame::new(layout);
//! let packet = encoder.encode(&frame)?;
//! let decoded = decoder.decode(&packet)?;
//! assert_eq!(decoded.frame, frame);
//! ```
//!
//! # Features
//!
//! - **Versions 0 to 4**: in-band or out-of-band (extradata) stream headers
//! - **YCbCr, gray and RGB**: 8 to 16 bits per sample, optional alpha plane
//! - **Slice CRCs**: damaged slices are reported and concealed from the previous frame
//! - **Optional parallelism**: enable the `rayon` feature to code slices concurrently
//! - **`slice-trace`**: per-slice trace logging through the `log` facade

// Core modules
pub mod codec;
pub mod coder;
pub mod header;
pub mod image;
pub mod model;
pub mod slice;
pub mod utils;

// Encoder and decoder
pub use codec::{DecodedFrame, Decoder, DecoderConfig, Encoder, EncoderConfig, SliceRequest};

// Stream parameters
pub use header::{ChromaLayout, Coder, Colorspace, ErrorCheck, GlobalParams};

// Image types
pub use crate::image::{Frame, FrameLayout, PictureStructure, Plane, Rect, SampleAspectRatio};

// Error types
pub use utils::error::{Ffv1Error, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_round_trip() {
        let layout = FrameLayout::yuv(48, 32, ChromaLayout::YUV422, 8);
        let mut encoder = Encoder::new(EncoderConfig::new(layout).with_context_model(1)).unwrap();
        let mut config = DecoderConfig::new(48, 32);
        if let Some(extradata) = encoder.extradata() {
            config = config.with_extradata(extradata);
        }
        let mut decoder = Decoder::new(config).unwrap();

        let planes = (0..layout.plane_count())
            .map(|i| {
                let (w, h) = layout.plane_size(i);
                Plane::from_fn(w, h, |x, y| ((x ^ y) * 9 % 256) as u16)
            })
            .collect();
        let frame = Frame::from_planes(layout, planes).unwrap();
        let decoded = decoder.decode(&encoder.encode(&frame).unwrap()).unwrap();
        assert!(decoded.key_frame);
        assert_eq!(decoded.frame, frame);
    }
}
