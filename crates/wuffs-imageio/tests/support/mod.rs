#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use wuffs_imageio::{FrameCodec, FrameResult, NativeApi, ProbeResult, WuffsError, WuffsResult};

/// `FrameCodec` backed by the `image` crate, producing the same B,G,R,A layout as the native
/// library. Lets reader and registry tests run without packaged natives.
pub struct ImageCrateCodec;

fn codec_error(operation: &'static str, e: impl std::fmt::Display) -> WuffsError {
    WuffsError::NativeDecode {
        operation,
        code: -3,
        message: e.to_string(),
    }
}

impl FrameCodec for ImageCrateCodec {
    fn probe(&self, data: &[u8]) -> WuffsResult<ProbeResult> {
        if data.is_empty() {
            return Err(WuffsError::invalid_input("data is empty"));
        }
        let (w, h) = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| codec_error("wuffs_probe_image", e))?
            .into_dimensions()
            .map_err(|e| codec_error("wuffs_probe_image", e))?;
        Ok(ProbeResult {
            width: w as i32,
            height: h as i32,
            frame_count: 1,
            bytes_per_pixel: 4,
            stride_bytes: w as i32 * 4,
        })
    }

    fn decode_frame_into(
        &self,
        data: &[u8],
        frame_index: u32,
        dst: &mut [u8],
    ) -> WuffsResult<FrameResult> {
        if frame_index != 0 {
            return Err(codec_error("wuffs_decode_frame_into", "not implemented"));
        }
        let rgba = image::load_from_memory(data)
            .map_err(|e| codec_error("wuffs_decode_frame_into", e))?
            .to_rgba8();
        if dst.len() != rgba.as_raw().len() {
            return Err(WuffsError::NativeDecode {
                operation: "wuffs_decode_frame_into",
                code: -1,
                message: "invalid argument".into(),
            });
        }
        for (out, px) in dst.chunks_exact_mut(4).zip(rgba.pixels()) {
            let [r, g, b, a] = px.0;
            out.copy_from_slice(&[b, g, r, a]);
        }
        Ok(FrameResult {
            width: rgba.width() as i32,
            height: rgba.height() as i32,
            stride_bytes: rgba.width() as i32 * 4,
            bytes_written: dst.len() as i32,
        })
    }
}

pub fn image_codec() -> Arc<dyn FrameCodec> {
    Arc::new(ImageCrateCodec)
}

/// Deterministic RGBA pattern with varying alpha.
pub fn pattern(x: u32, y: u32) -> [u8; 4] {
    [
        (x * 37 % 256) as u8,
        (y * 53 % 256) as u8,
        ((x + y) * 11 % 256) as u8,
        (255 - (x * 7 + y * 3) % 200) as u8,
    ]
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(pattern(x, y)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, _] = pattern(x, y);
        image::Rgb([r, g, b])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn solid_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// Lossy red: red channel high, green and blue low, opaque.
pub fn assert_reddish(px: Option<[u8; 4]>) {
    let [r, g, b, a] = px.expect("pixel in bounds");
    assert!(r > 200 && g < 60 && b < 60, "expected red, got {:?}", [r, g, b, a]);
    assert_eq!(a, 0xFF);
}

/// Flips one bit of the first IDAT payload byte, leaving the CRC stale.
pub fn corrupt_first_idat(png: &mut [u8]) {
    let mut off = 8;
    while off + 8 <= png.len() {
        let len = u32::from_be_bytes([png[off], png[off + 1], png[off + 2], png[off + 3]]) as usize;
        let kind = &png[off + 4..off + 8];
        let data = off + 8;
        let next = data + len + 4;
        if next > png.len() {
            break;
        }
        if kind == b"IDAT" && len > 0 {
            png[data] ^= 0x01;
            return;
        }
        off = next;
    }
    let last = png.len() - 1;
    png[last] ^= 0xFF;
}

/// The process-wide native handle, or `None` (with a note) when no natives are packaged.
pub fn native_or_skip(test: &str) -> Option<&'static NativeApi> {
    match wuffs_imageio::bridge() {
        Ok(api) => Some(api),
        Err(e) => {
            eprintln!("skipping {test}: native library unavailable: {e}");
            None
        }
    }
}
