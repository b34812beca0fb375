use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Embeds prebuilt natives for the target platform when `WUFFS_IMAGEIO_BUNDLE_DIR` is set.
///
/// Layout of the bundle dir: `<dir>/<platform_id>/<file>`.
/// Without the variable the generated table is empty and natives come from the runtime dir.
fn main() {
    println!("cargo:rerun-if-env-changed=WUFFS_IMAGEIO_BUNDLE_DIR");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    let mut entries: Vec<(String, PathBuf)> = Vec::new();

    if let Some(bundle) = env::var_os("WUFFS_IMAGEIO_BUNDLE_DIR") {
        let bundle = PathBuf::from(bundle);
        match target_platform(&target_os, &target_arch) {
            Some((platform_id, files)) => {
                for file in files {
                    let src = bundle.join(platform_id).join(file);
                    println!("cargo:rerun-if-changed={}", src.display());
                    if src.is_file() {
                        entries.push((format!("natives/{platform_id}/{file}"), src));
                    } else {
                        println!("cargo:warning=native bundle entry missing: {}", src.display());
                    }
                }
            }
            None => {
                println!(
                    "cargo:warning=no native bundle for target {target_os}/{target_arch}; embedding nothing"
                );
            }
        }
    }

    let mut code = String::new();
    code.push_str("pub(crate) static EMBEDDED_NATIVES: &[(&str, &[u8])] = &[\n");
    for (key, path) in &entries {
        let abs = absolute(path);
        let _ = writeln!(
            code,
            "    ({key:?}, include_bytes!({:?})),",
            abs.display().to_string()
        );
    }
    code.push_str("];\n");

    fs::write(out_dir.join("embedded_natives.rs"), code).expect("write embedded_natives.rs");
}

fn target_platform(os: &str, arch: &str) -> Option<(&'static str, &'static [&'static str])> {
    match (os, arch) {
        ("macos", "aarch64") => Some(("arm64-macos", &["libwuffs_imageio.dylib"])),
        ("macos", "x86_64") => Some((
            "x86_64-macos",
            &["libwuffs_imageio.dylib", "libwuffs_imageio_avx2.dylib"],
        )),
        ("linux", "x86_64") => Some((
            "x86_64-linux",
            &["libwuffs_imageio.so", "libwuffs_imageio_avx2.so"],
        )),
        ("windows", "x86_64") => Some((
            "x86_64-win32",
            &["wuffs_imageio.dll", "wuffs_imageio_avx2.dll"],
        )),
        _ => None,
    }
}

fn absolute(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}
