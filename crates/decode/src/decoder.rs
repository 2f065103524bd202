//! Decoder trait and the built-in raster decoder
//!
//! Decoding is deterministic: identical encoded bytes always produce an
//! identical pixel buffer. Decoders may be invoked concurrently for distinct
//! resources; coalescing of duplicate requests for the same resource is the
//! cache's job, not the decoder's.

use crate::pixels::PixelBuffer;

/// Errors produced while decoding encoded image bytes.
///
/// Neither variant is retried automatically; the error is surfaced to the
/// caller, who may retry explicitly (e.g. after re-fetching the bytes).
/// Cloneable so that every caller coalesced onto one decode can observe the
/// same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The format was recognized but the data is malformed
    #[error("corrupt image data: {0}")]
    Corrupt(String),

    /// The encoded bytes are not in any recognized image format
    #[error("unsupported or unrecognized image format")]
    Unsupported,
}

/// A decoder that turns encoded image bytes into an RGBA pixel buffer.
///
/// Implementations must be pure over the input bytes: no side effects beyond
/// returning the buffer, and no mutation of any cache state. `Send + Sync`
/// because the cache invokes the decoder from multiple threads at once.
pub trait ImageDecoder: Send + Sync {
    /// Decode `encoded` into a pixel buffer.
    fn decode(&self, encoded: &[u8]) -> Result<PixelBuffer, DecodeError>;
}

/// Built-in decoder backed by the `image` crate.
///
/// Sniffs the format from the magic bytes, then decodes and normalizes the
/// result to RGBA8.
///
/// # Example
///
/// ```no_run
/// use img_viewer_decode::{ImageDecoder, RasterDecoder};
///
/// let decoder = RasterDecoder::new();
/// let encoded: Vec<u8> = std::fs::read("photo.png").unwrap();
/// let buffer = decoder.decode(&encoded).unwrap();
/// println!("decoded {}x{}", buffer.width, buffer.height);
/// ```
#[derive(Debug, Default)]
pub struct RasterDecoder;

impl RasterDecoder {
    /// Create a new raster decoder.
    pub fn new() -> Self {
        Self
    }
}

impl ImageDecoder for RasterDecoder {
    fn decode(&self, encoded: &[u8]) -> Result<PixelBuffer, DecodeError> {
        let format = image::guess_format(encoded).map_err(|_| DecodeError::Unsupported)?;

        let decoded =
            image::load_from_memory_with_format(encoded, format).map_err(|err| match err {
                image::ImageError::Unsupported(_) => DecodeError::Unsupported,
                other => DecodeError::Corrupt(other.to_string()),
            })?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        PixelBuffer::from_rgba(width, height, rgba.into_raw())
            .ok_or_else(|| DecodeError::Corrupt("pixel data length mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    /// Encode a solid-color RGBA image as PNG bytes.
    fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let mut raw = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            raw.extend_from_slice(&pixel);
        }
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&raw, width, height, ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    #[test]
    fn test_decode_png() {
        let encoded = png_bytes(4, 3, [10, 20, 30, 255]);
        let decoder = RasterDecoder::new();

        let buffer = decoder.decode(&encoded).unwrap();
        assert_eq!(buffer.width, 4);
        assert_eq!(buffer.height, 3);
        assert_eq!(buffer.memory_size(), 4 * 3 * 4);
        assert_eq!(&buffer.pixels[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_deterministic() {
        let encoded = png_bytes(8, 8, [1, 2, 3, 4]);
        let decoder = RasterDecoder::new();

        let first = decoder.decode(&encoded).unwrap();
        let second = decoder.decode(&encoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unrecognized_format() {
        let decoder = RasterDecoder::new();
        let result = decoder.decode(b"this is not an image at all");
        assert_eq!(result.unwrap_err(), DecodeError::Unsupported);
    }

    #[test]
    fn test_corrupt_data() {
        // Valid PNG magic, truncated body
        let mut encoded = png_bytes(16, 16, [0, 0, 0, 255]);
        encoded.truncate(encoded.len() / 2);

        let decoder = RasterDecoder::new();
        match decoder.decode(&encoded) {
            Err(DecodeError::Corrupt(_)) => {}
            other => panic!("expected Corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        let decoder = RasterDecoder::new();
        assert_eq!(decoder.decode(&[]).unwrap_err(), DecodeError::Unsupported);
    }
}
