//! Raster frames for the tomat pipeline.
//!
//! Frames are packed 8-bit pixels described by `Image`. This crate converts
//! them to and from JPEG and `data:image/...;base64,` URLs, and draws
//! labeled boxes on them.

mod dataurl;
pub use dataurl::*;

mod draw;
pub use draw::*;

mod error;
pub use error::*;

mod font;

mod image;
pub use image::*;

mod jpeg;
pub use jpeg::*;

mod pixelformat;
pub use pixelformat::*;
