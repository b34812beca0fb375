use crate::error::{WuffsError, WuffsResult};

/// Offsets of R, G, B, A inside each native B,G,R,A pixel.
pub const BAND_OFFSETS: [usize; 4] = [2, 1, 0, 3];

/// Describes the single pixel layout readers produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub bytes_per_pixel: usize,
    pub band_offsets: [usize; 4],
    pub has_alpha: bool,
    pub premultiplied: bool,
}

impl PixelLayout {
    /// 8-bit sRGB, straight alpha, stored B,G,R,A.
    pub const BGRA_STRAIGHT: PixelLayout = PixelLayout {
        bytes_per_pixel: 4,
        band_offsets: BAND_OFFSETS,
        has_alpha: true,
        premultiplied: false,
    };
}

/// A decoded frame that owns the native output buffer as-is.
///
/// Channel order is remapped on access via [`BAND_OFFSETS`]; the bytes are never
/// reordered or copied.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl DecodedImage {
    /// Wraps `pixels` (B,G,R,A rows of `stride` bytes) without copying.
    pub fn from_bgra(width: u32, height: u32, stride: usize, pixels: Vec<u8>) -> WuffsResult<Self> {
        let row = (width as usize)
            .checked_mul(PixelLayout::BGRA_STRAIGHT.bytes_per_pixel)
            .ok_or_else(|| WuffsError::invalid_input("row length overflows"))?;
        if stride < row {
            return Err(WuffsError::invalid_input(format!(
                "stride {stride} shorter than row {row}"
            )));
        }
        let needed = stride
            .checked_mul(height as usize)
            .ok_or_else(|| WuffsError::invalid_input("pixel buffer length overflows"))?;
        if pixels.len() < needed {
            return Err(WuffsError::invalid_input(format!(
                "pixel buffer too short: {} < {needed}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn layout(&self) -> PixelLayout {
        PixelLayout::BGRA_STRAIGHT
    }

    #[inline]
    pub fn band_offsets(&self) -> [usize; 4] {
        BAND_OFFSETS
    }

    #[inline]
    fn base(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride + x as usize * 4)
    }

    /// Pixel at `(x, y)` as `[r, g, b, a]`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let base = self.base(x, y)?;
        let px = &self.pixels[base..base + 4];
        Some(BAND_OFFSETS.map(|o| px[o]))
    }

    /// Pixel at `(x, y)` packed as `0xAARRGGBB`.
    #[inline]
    pub fn argb(&self, x: u32, y: u32) -> Option<u32> {
        let [r, g, b, a] = self.pixel(x, y)?;
        Some(u32::from_be_bytes([a, r, g, b]))
    }

    /// Raw B,G,R,A bytes.
    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// Copies out tightly packed R,G,B,A rows.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height as usize {
            let row = &self.pixels[y * self.stride..y * self.stride + self.width as usize * 4];
            for px in row.chunks_exact(4) {
                out.extend(BAND_OFFSETS.map(|o| px[o]));
            }
        }
        out
    }
}
