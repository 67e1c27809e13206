// src/image/image_formats.rs

//! Planar frame buffers handed to the encoder and returned by the decoder.
//!
//! Every plane stores its samples as `u16` in row-major order, whatever the
//! bit depth; only the low `bits_per_raw_sample` bits are significant.
//!
//! Plane order:
//!
//! | colorspace       | planes          |
//! |------------------|-----------------|
//! | YCbCr            | Y, Cb, Cr, [A]  |
//! | YCbCr grayscale  | Y, [A]          |
//! | RGB              | G, B, R, [A]    |

use crate::header::params::{ChromaLayout, Colorspace, GlobalParams};
use crate::image::geom::Rect;
use crate::utils::error::{Ffv1Error, Result};

// --- Plane ---

/// A 2D buffer of samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl Plane {
    /// Creates a plane with every sample at zero.
    pub fn new(width: u32, height: u32) -> Self {
        Plane {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Creates a plane from row-major samples.
    pub fn from_vec(width: u32, height: u32, data: Vec<u16>) -> Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(Ffv1Error::InvalidArg(format!(
                "{} samples for a {}x{} plane",
                data.len(),
                width,
                height
            )));
        }
        Ok(Plane {
            width,
            height,
            data,
        })
    }

    /// Creates a plane by calling a function for each sample.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> u16,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Plane {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, v: u16) {
        let w = self.width as usize;
        self.data[y as usize * w + x as usize] = v;
    }

    pub fn row(&self, y: usize) -> &[u16] {
        let w = self.width as usize;
        &self.data[y * w..(y + 1) * w]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u16] {
        let w = self.width as usize;
        &mut self.data[y * w..(y + 1) * w]
    }

    pub fn samples(&self) -> &[u16] {
        &self.data
    }

    /// Native-endian view of the samples, two bytes each.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Copies the samples under `rect` from `src`, clipped to both planes.
    pub fn copy_rect_from(&mut self, src: &Plane, rect: Rect) {
        let bounds = Rect::new(0, 0, self.width as usize, self.height as usize)
            .intersection(&Rect::new(0, 0, src.width as usize, src.height as usize))
            .intersection(&rect);
        for y in bounds.y..bounds.y_max() {
            let from = &src.row(y)[bounds.x..bounds.x_max()];
            self.row_mut(y)[bounds.x..bounds.x_max()].copy_from_slice(from);
        }
    }

    /// Writes all of `src` with its top-left corner at (`x`, `y`), clipped.
    pub fn paste(&mut self, src: &Plane, x: usize, y: usize) {
        let dst = Rect::new(x, y, src.width as usize, src.height as usize)
            .intersection(&Rect::new(0, 0, self.width as usize, self.height as usize));
        for row in dst.y..dst.y_max() {
            let from = &src.row(row - y)[dst.x - x..dst.x_max() - x];
            self.row_mut(row)[dst.x..dst.x_max()].copy_from_slice(from);
        }
    }
}

// --- Layout ---

/// Geometry and sample format of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub bits_per_raw_sample: u32,
    pub transparency: bool,
}

impl FrameLayout {
    pub fn yuv(width: u32, height: u32, layout: ChromaLayout, bits_per_raw_sample: u32) -> Self {
        FrameLayout {
            width,
            height,
            colorspace: Colorspace::YCbCr(layout),
            bits_per_raw_sample,
            transparency: false,
        }
    }

    pub fn gray(width: u32, height: u32, bits_per_raw_sample: u32) -> Self {
        Self::yuv(width, height, ChromaLayout::GRAY, bits_per_raw_sample)
    }

    pub fn rgb(width: u32, height: u32, bits_per_raw_sample: u32) -> Self {
        FrameLayout {
            width,
            height,
            colorspace: Colorspace::Rgb,
            bits_per_raw_sample,
            transparency: false,
        }
    }

    /// Layout of the frames of a stream with parameters `p`.
    pub fn for_stream(p: &GlobalParams, width: u32, height: u32) -> Self {
        FrameLayout {
            width,
            height,
            colorspace: p.colorspace,
            bits_per_raw_sample: p.bits_per_raw_sample,
            transparency: p.transparency,
        }
    }

    pub fn with_alpha(mut self, transparency: bool) -> Self {
        self.transparency = transparency;
        self
    }

    /// Planes present in a frame buffer (not the number of coding contexts).
    pub fn plane_count(&self) -> usize {
        let colour = if self.colorspace.layout().chroma_planes { 3 } else { 1 };
        colour + self.transparency as usize
    }

    /// True for the two subsampled chroma planes of a YCbCr frame.
    pub fn is_chroma(&self, index: usize) -> bool {
        !self.colorspace.is_rgb() && self.colorspace.layout().chroma_planes && (index == 1 || index == 2)
    }

    /// Region of plane `index` covered by the luma rectangle `rect`.
    pub fn plane_rect(&self, index: usize, rect: Rect) -> Rect {
        if self.is_chroma(index) {
            let l = self.colorspace.layout();
            rect.subsampled(l.h_shift, l.v_shift)
        } else {
            rect
        }
    }

    pub fn plane_size(&self, index: usize) -> (u32, u32) {
        let full = Rect::new(0, 0, self.width as usize, self.height as usize);
        let r = self.plane_rect(index, full);
        (r.width as u32, r.height as u32)
    }

    pub fn max_sample(&self) -> u16 {
        ((1u32 << self.bits_per_raw_sample.min(16)) - 1) as u16
    }
}

// --- Frame metadata ---

/// Field order as carried in the slice headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PictureStructure {
    #[default]
    Unknown,
    TopFieldFirst,
    BottomFieldFirst,
    Progressive,
}

impl PictureStructure {
    pub fn from_wire(v: u32) -> Self {
        match v {
            1 => PictureStructure::TopFieldFirst,
            2 => PictureStructure::BottomFieldFirst,
            3 => PictureStructure::Progressive,
            _ => PictureStructure::Unknown,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            PictureStructure::Unknown => 0,
            PictureStructure::TopFieldFirst => 1,
            PictureStructure::BottomFieldFirst => 2,
            PictureStructure::Progressive => 3,
        }
    }
}

/// Sample aspect ratio; `0/1` means unknown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleAspectRatio {
    pub num: u32,
    pub den: u32,
}

impl Default for SampleAspectRatio {
    fn default() -> Self {
        SampleAspectRatio { num: 0, den: 1 }
    }
}

impl SampleAspectRatio {
    pub fn new(num: u32, den: u32) -> Self {
        if num == 0 || den == 0 {
            Self::default()
        } else {
            SampleAspectRatio { num, den }
        }
    }
}

// --- Frame ---

/// A complete picture: its layout, planes and field/aspect metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    layout: FrameLayout,
    planes: Vec<Plane>,
    pub picture_structure: PictureStructure,
    pub sample_aspect_ratio: SampleAspectRatio,
}

impl Frame {
    /// A frame with every sample at zero.
    pub fn new(layout: FrameLayout) -> Self {
        let planes = (0..layout.plane_count())
            .map(|i| {
                let (w, h) = layout.plane_size(i);
                Plane::new(w, h)
            })
            .collect();
        Frame {
            layout,
            planes,
            picture_structure: PictureStructure::Progressive,
            sample_aspect_ratio: SampleAspectRatio::default(),
        }
    }

    /// Wraps caller planes after checking their count, size and sample range.
    pub fn from_planes(layout: FrameLayout, planes: Vec<Plane>) -> Result<Self> {
        if planes.len() != layout.plane_count() {
            return Err(Ffv1Error::InvalidArg(format!(
                "layout needs {} planes, got {}",
                layout.plane_count(),
                planes.len()
            )));
        }
        let max = layout.max_sample();
        for (i, plane) in planes.iter().enumerate() {
            let (w, h) = layout.plane_size(i);
            if plane.width() != w || plane.height() != h {
                return Err(Ffv1Error::DimensionMismatch {
                    expected: (w, h),
                    actual: (plane.width(), plane.height()),
                });
            }
            if let Some(v) = plane.samples().iter().find(|&&v| v > max) {
                return Err(Ffv1Error::InvalidArg(format!(
                    "plane {} holds sample {} above {} bits",
                    i, v, layout.bits_per_raw_sample
                )));
            }
        }
        Ok(Frame {
            layout,
            planes,
            picture_structure: PictureStructure::Progressive,
            sample_aspect_ratio: SampleAspectRatio::default(),
        })
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut [Plane] {
        &mut self.planes
    }

    pub fn into_planes(self) -> Vec<Plane> {
        self.planes
    }

    /// Copies every plane's share of the luma rectangle `rect` from `src`.
    pub fn copy_region_from(&mut self, src: &Frame, rect: Rect) {
        let layout = self.layout;
        for (i, (dst, from)) in self.planes.iter_mut().zip(&src.planes).enumerate() {
            dst.copy_rect_from(from, layout.plane_rect(i, rect));
        }
    }
}
