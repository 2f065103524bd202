//! Image Decode Engine
//!
//! Turns raw encoded image bytes into RGBA pixel buffers on demand. The
//! engine is stateless: decoding is a pure function over the input bytes and
//! never touches cache state (the cache crate commits results itself).

pub mod decoder;
pub mod pixels;

pub use decoder::{DecodeError, ImageDecoder, RasterDecoder};
pub use pixels::PixelBuffer;
