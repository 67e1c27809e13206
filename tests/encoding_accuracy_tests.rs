//! Lossless round trips across versions, coders, pixel formats and slice grids.

use ffv1::{
    ChromaLayout, Coder, Decoder, DecoderConfig, Encoder, EncoderConfig, ErrorCheck, Frame,
    FrameLayout, Plane,
};

/// Smooth gradients with a little deterministic noise and a flat block, so
/// both the residual coder and the Golomb run mode get exercised.
fn test_frame(layout: FrameLayout, seed: u32) -> Frame {
    let max = layout.max_sample() as u32;
    let mut state = seed.wrapping_mul(0x9E37_79B9) | 1;
    let planes = (0..layout.plane_count())
        .map(|i| {
            let (w, h) = layout.plane_size(i);
            Plane::from_fn(w, h, |x, y| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                if x < w / 4 && y < h / 3 {
                    return (max / 2) as u16;
                }
                let base = (x * 37 + y * 19 + i as u32 * 500 + seed * 11) * (max / 255).max(1);
                ((base + state % 7) % (max + 1)) as u16
            })
        })
        .collect();
    Frame::from_planes(layout, planes).expect("valid test frame")
}

fn decoder_for(encoder: &Encoder, layout: FrameLayout) -> Decoder {
    let mut config = DecoderConfig::new(layout.width, layout.height);
    if let Some(extradata) = encoder.extradata() {
        config = config.with_extradata(extradata);
    }
    Decoder::new(config).expect("decoder")
}

/// Codes `frames` frames and checks every one decodes bit-exactly.
fn assert_lossless(config: EncoderConfig, frames: u32) {
    let layout = config.layout;
    let mut encoder = Encoder::new(config.clone()).expect("encoder");
    let mut decoder = decoder_for(&encoder, layout);
    for n in 0..frames {
        let input = test_frame(layout, n);
        let packet = encoder.encode(&input).expect("encode");
        let output = decoder.decode(&packet).expect("decode");
        assert!(output.is_intact(), "{:?}: damaged slices {:?}", config, output.damaged_slices);
        assert_eq!(output.frame, input, "frame {} of {:?}", n, config);
    }
}

fn legacy(layout: FrameLayout, version: u32) -> EncoderConfig {
    EncoderConfig::new(layout)
        .with_version(version)
        .with_error_check(ErrorCheck::None)
}

#[test]
fn test_version_zero() {
    assert_lossless(legacy(FrameLayout::yuv(33, 17, ChromaLayout::YUV420, 8), 0), 3);
    assert_lossless(
        legacy(FrameLayout::gray(20, 9, 8), 0).with_coder(Coder::GolombRice),
        3,
    );
    assert_lossless(
        legacy(FrameLayout::yuv(16, 16, ChromaLayout::YUV444, 8).with_alpha(true), 0)
            .with_context_model(1),
        2,
    );
}

#[test]
fn test_version_one() {
    assert_lossless(legacy(FrameLayout::yuv(31, 22, ChromaLayout::YUV422, 10), 1), 3);
    assert_lossless(legacy(FrameLayout::rgb(19, 13, 8), 1).with_gop_size(2), 3);
    assert_lossless(
        legacy(FrameLayout::rgb(12, 12, 8).with_alpha(true), 1).with_coder(Coder::GolombRice),
        2,
    );
    assert_lossless(
        legacy(FrameLayout::gray(10, 10, 16), 1).with_coder(Coder::RangeCustom),
        2,
    );
}

#[test]
fn test_version_two_slices() {
    assert_lossless(
        legacy(FrameLayout::yuv(40, 32, ChromaLayout::YUV420, 8), 2)
            .with_slice_grid(2, 2)
            .with_gop_size(3),
        4,
    );
    assert_lossless(
        legacy(FrameLayout::yuv(40, 32, ChromaLayout::YUV420, 8), 2)
            .with_slice_grid(2, 1)
            .with_coder(Coder::GolombRice),
        3,
    );
}

#[test]
fn test_version_three() {
    assert_lossless(
        EncoderConfig::new(FrameLayout::yuv(45, 29, ChromaLayout::YUV420, 12)).with_context_model(1),
        3,
    );
    assert_lossless(
        EncoderConfig::new(FrameLayout::gray(24, 24, 16)).with_slice_grid(3, 2),
        2,
    );
    assert_lossless(
        EncoderConfig::new(FrameLayout::rgb(30, 20, 16).with_alpha(true)).with_slices(4),
        2,
    );
    assert_lossless(
        EncoderConfig::new(FrameLayout::yuv(32, 32, ChromaLayout::YUV420, 8))
            .with_coder(Coder::GolombRice)
            .with_slices(4)
            .with_gop_size(1),
        3,
    );
}

#[test]
fn test_version_four() {
    let v4 = |layout| {
        EncoderConfig::new(layout)
            .with_version(4)
            .with_error_check(ErrorCheck::SeededCrc)
    };
    assert_lossless(v4(FrameLayout::rgb(27, 18, 10).with_alpha(true)).with_slice_grid(2, 2), 3);
    assert_lossless(v4(FrameLayout::rgb(16, 16, 8)).with_context_model(1), 2);
    assert_lossless(v4(FrameLayout::gray(21, 14, 16)).with_coder(Coder::GolombRice), 2);
    assert_lossless(
        v4(FrameLayout::yuv(26, 26, ChromaLayout::YUV420, 8).with_alpha(true)).with_slice_grid(3, 3),
        3,
    );
}

#[test]
fn test_single_pixel_frame() {
    assert_lossless(EncoderConfig::new(FrameLayout::yuv(1, 1, ChromaLayout::YUV420, 8)), 2);
    assert_lossless(legacy(FrameLayout::rgb(1, 1, 8), 0), 2);
}

#[test]
fn test_pcm_slices_round_trip() {
    // A budget below what noise needs forces the raw fallback.
    let layout = FrameLayout::rgb(32, 32, 8);
    let mut state = 0x2545_F491u32;
    let planes = (0..3)
        .map(|_| {
            Plane::from_fn(32, 32, |_, _| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 256) as u16
            })
        })
        .collect();
    let noise = Frame::from_planes(layout, planes).unwrap();

    let config = EncoderConfig::new(layout)
        .with_version(4)
        .with_slices(1)
        .with_slice_budget(3150);
    let mut encoder = Encoder::new(config).unwrap();
    let mut decoder = decoder_for(&encoder, layout);
    let packet = encoder.encode(&noise).unwrap();
    assert!(packet.len() <= 3150 + 8);
    assert_eq!(decoder.decode(&packet).unwrap().frame, noise);

    // The next inter frame codes normally again from reset contexts.
    let smooth = test_frame(layout, 1);
    let packet = encoder.encode(&smooth).unwrap();
    assert_eq!(decoder.decode(&packet).unwrap().frame, smooth);
}
