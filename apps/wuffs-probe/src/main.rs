use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use log::{info, warn};
use serde_json::json;

use wuffs_imageio::{
    native, sniff, BasicImageMetadata, DecodedImage, NativeLibrary, PlatformDescriptor,
    ProviderRegistry,
};
use wuffs_imageio_logging::{init_console_logger, ConsoleLoggerConfig};

/// Reports native loading and decodes files through wuffs-imageio.
#[derive(Parser, Debug)]
#[command(name = "wuffs-probe")]
#[command(version, about, long_about = None)]
struct Args {
    /// Do not order our PNG/JPEG readers ahead of other registered readers
    #[arg(long = "no-prefer", action = ArgAction::SetFalse)]
    prefer: bool,

    /// Print one JSON object per file
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Image files to decode
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

struct Report {
    format: &'static str,
    image: DecodedImage,
    millis: f64,
    checksum: blake3::Hash,
}

fn decode_file(path: &Path) -> anyhow::Result<Report> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let format = sniff::sniff_bytes(&bytes).map(|f| f.name()).unwrap_or("other");

    let start = Instant::now();
    let image = wuffs_imageio::read(bytes).with_context(|| format!("decode {}", path.display()))?;
    let millis = start.elapsed().as_secs_f64() * 1000.0;
    let checksum = blake3::hash(image.as_raw());

    Ok(Report {
        format,
        image,
        millis,
        checksum,
    })
}

fn run(args: &Args) -> anyhow::Result<usize> {
    let platform = PlatformDescriptor::current();
    info!(
        "platform={} supported={} resource={}",
        platform.label(),
        platform.supported,
        NativeLibrary::resource_path_for_current_platform().unwrap_or_else(|| "<none>".into())
    );

    wuffs_imageio::register(ProviderRegistry::global(), args.prefer);

    let loaded = NativeLibrary::load().context("load native library")?;
    info!(
        "loaded {} variant from '{}'",
        loaded.variant(),
        loaded.path().display()
    );

    let mut failures = 0;
    for path in &args.files {
        match decode_file(path) {
            Ok(r) => {
                let meta = BasicImageMetadata::new(
                    r.image.width() as i32,
                    r.image.height() as i32,
                    4,
                );
                if args.json {
                    let line = json!({
                        "file": path.display().to_string(),
                        "format": r.format,
                        "metadata": meta.to_json(),
                        "decode_ms": r.millis,
                        "blake3": r.checksum.to_hex().to_string(),
                    });
                    println!("{line}");
                } else {
                    println!(
                        "{}: {} {}x{} in {:.2} ms blake3={}",
                        path.display(),
                        r.format,
                        r.image.width(),
                        r.image.height(),
                        r.millis,
                        r.checksum.to_hex()
                    );
                }
            }
            Err(e) => {
                failures += 1;
                warn!("{}: {e:#}", path.display());
            }
        }
    }
    Ok(failures)
}

fn main() -> anyhow::Result<()> {
    init_console_logger(&ConsoleLoggerConfig::from_env())?;

    let args = Args::parse();

    let result = run(&args);
    let removed = native::cleanup_extracted();
    log::debug!("removed {removed} extracted native paths");

    let failures = result?;
    if failures > 0 {
        bail!("{failures} of {} files failed", args.files.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(v: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("wuffs-probe").chain(v.iter().copied()))
    }

    #[test]
    fn flags_and_files() {
        let a = parse(&["--json", "a.png", "--no-prefer", "b.jpg"]).unwrap();
        assert!(a.json);
        assert!(!a.prefer);
        assert_eq!(a.files, [PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
    }

    #[test]
    fn prefer_is_default() {
        let a = parse(&["x.png"]).unwrap();
        assert!(a.prefer);
        assert!(!a.json);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&["--fast", "x.png"]).is_err());
    }

    #[test]
    fn files_are_required() {
        let err = parse(&["--json"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
