//! Decoded pixel buffer type

/// A decoded image held in memory as tightly packed RGBA8 pixels.
///
/// This is the unit of data the discard cache keeps resident and releases
/// under memory pressure. Buffers compare equal when their dimensions and
/// pixel contents match, which is what "equivalent buffer after re-decode"
/// means for identical encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Raw pixel data, `width * height * 4` bytes (RGBA order)
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Create a pixel buffer from raw RGBA data.
    ///
    /// Returns `None` if the data length does not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Memory footprint of this buffer in bytes.
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }
}
