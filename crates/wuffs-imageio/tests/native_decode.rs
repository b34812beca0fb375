//! End-to-end decode through the real `wuffs_imageio` binary. Every test returns early when
//! no natives are packaged for this platform.

mod support;

use wuffs_imageio::{read, NativeLibrary, PlatformDescriptor, WuffsError};

use support::{
    assert_reddish, corrupt_first_idat, jpeg_bytes, native_or_skip, pattern, png_bytes, solid_jpeg,
    solid_png,
};

#[test]
fn loader_reports_what_it_loaded() {
    if native_or_skip("loader_reports_what_it_loaded").is_none() {
        return;
    }
    assert!(NativeLibrary::is_loaded());
    let path = NativeLibrary::loaded_library_path().unwrap();
    assert!(path.is_file());

    let platform = PlatformDescriptor::current();
    let expected = [
        platform.baseline_library_file.as_deref(),
        platform.accel_library_file.as_deref(),
    ];
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(expected.contains(&Some(name)), "unexpected file {name}");

    // Repeated loads hand back the same handle.
    let a = NativeLibrary::load().unwrap() as *const _;
    let b = NativeLibrary::load().unwrap() as *const _;
    assert_eq!(a, b);
    NativeLibrary::loaded_variant().unwrap();
}

#[test]
fn png_decodes_to_reference_pixels() {
    if native_or_skip("png_decodes_to_reference_pixels").is_none() {
        return;
    }
    let img = read(png_bytes(13, 7)).unwrap();
    assert_eq!((img.width(), img.height()), (13, 7));
    assert_eq!(img.as_raw().len(), 13 * 7 * 4);
    for y in 0..7 {
        for x in 0..13 {
            assert_eq!(img.pixel(x, y), Some(pattern(x, y)), "pixel ({x},{y})");
        }
    }
}

#[test]
fn jpeg_decodes_opaque() {
    if native_or_skip("jpeg_decodes_opaque").is_none() {
        return;
    }
    let img = read(jpeg_bytes(32, 16)).unwrap();
    assert_eq!((img.width(), img.height()), (32, 16));
    assert!(img.as_raw().chunks_exact(4).all(|px| px[3] == 0xFF));
}

#[test]
fn opaque_red_png_pixel() {
    if native_or_skip("opaque_red_png_pixel").is_none() {
        return;
    }
    let img = read(solid_png(1, 1, [0xFF, 0, 0, 0xFF])).unwrap();
    assert_eq!((img.width(), img.height()), (1, 1));
    assert_eq!(img.pixel(0, 0), Some([0xFF, 0, 0, 0xFF]));
    assert_eq!(img.as_raw(), &[0, 0, 0xFF, 0xFF]);
}

#[test]
fn solid_red_jpeg_stays_red() {
    if native_or_skip("solid_red_jpeg_stays_red").is_none() {
        return;
    }
    let img = read(solid_jpeg(16, 16, [0xFF, 0, 0])).unwrap();
    assert_eq!((img.width(), img.height()), (16, 16));
    assert_reddish(img.pixel(0, 0));
    assert_reddish(img.pixel(15, 15));
}

#[test]
fn probe_is_deterministic() {
    let Some(api) = native_or_skip("probe_is_deterministic") else {
        return;
    };
    let bytes = png_bytes(5, 4);
    let a = api.probe(&bytes).unwrap();
    let b = api.probe(&bytes).unwrap();
    assert_eq!(a, b);
    assert_eq!((a.width, a.height, a.frame_count), (5, 4, 1));
}

#[test]
fn corrupt_png_reports_codec_error() {
    if native_or_skip("corrupt_png_reports_codec_error").is_none() {
        return;
    }
    let mut bytes = png_bytes(1, 1);
    corrupt_first_idat(&mut bytes);

    let err = read(bytes).unwrap_err();
    assert!(matches!(err, WuffsError::NativeDecode { .. }), "got {err:?}");
    let msg = err.to_string().to_lowercase();
    assert!(
        msg.contains("png") || msg.contains("checksum") || msg.contains("wuffs"),
        "message should name the codec failure: {msg}"
    );
}

#[test]
fn unsupported_bytes_are_rejected_by_the_native_probe() {
    let Some(api) = native_or_skip("unsupported_bytes_are_rejected_by_the_native_probe") else {
        return;
    };
    let err = api.probe(b"GIF89a\x01\x00\x01\x00").unwrap_err();
    assert!(err.native_code().is_some());
    assert!(!err.is_fatal());
}
