//! Frame buffers and the rectangle arithmetic shared with the slice grid.

pub mod geom;
pub mod image_formats;

pub use geom::Rect;
pub use image_formats::{Frame, FrameLayout, PictureStructure, Plane, SampleAspectRatio};
