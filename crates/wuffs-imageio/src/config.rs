use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{WuffsError, WuffsResult};

pub const ENV_CONFIG_FILE: &str = "WUFFS_IMAGEIO_CONFIG";
pub const ENV_NATIVES_DIR: &str = "WUFFS_IMAGEIO_NATIVES_DIR";
pub const ENV_ACCELERATED: &str = "WUFFS_IMAGEIO_ACCEL";
pub const ENV_LOG_DECODE: &str = "WUFFS_IMAGEIO_LOG_DECODE";
pub const ENV_TEMP_PREFIX: &str = "WUFFS_IMAGEIO_TEMP_PREFIX";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    #[default]
    Defaults,
    File {
        path: PathBuf,
    },
    Mixed,
}

/// Normalized loader/reader configuration.
/// All fields have concrete defaults.
#[derive(Debug, Clone)]
pub struct NativeConfig {
    pub source: ConfigSource,

    /// Runtime natives directory laid out as `<dir>/<platform_id>/<file>`.
    pub natives_dir: Option<PathBuf>,
    /// Allow selecting the accelerated (AVX2) variant when the CPU supports it.
    pub accelerated: bool,
    /// Log every successful decode at info level.
    pub log_decode: bool,
    /// Prefix of the temporary directory natives are extracted into.
    pub temp_prefix: String,
}

impl Default for NativeConfig {
    #[inline]
    fn default() -> Self {
        Self {
            source: ConfigSource::Defaults,
            natives_dir: None,
            accelerated: true,
            log_decode: false,
            temp_prefix: "wuffs-imageio-natives-".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSource {
    File,
    Env,
    Programmatic,
}

#[derive(Debug, Clone)]
pub struct ConfigOverride {
    pub key: &'static str,
    pub source: OverrideSource,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigLoadReport {
    pub source: ConfigSource,
    /// The config file actually read, if any.
    pub file: Option<PathBuf>,
    pub overrides: Vec<ConfigOverride>,
}

impl ConfigLoadReport {
    #[inline]
    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }

    #[inline]
    pub fn is_defaults(&self) -> bool {
        matches!(self.source, ConfigSource::Defaults)
    }
}

/// A partial config layer. `None` fields leave the lower layer untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub natives_dir: Option<PathBuf>,
    pub accelerated: Option<bool>,
    pub log_decode: Option<bool>,
    pub temp_prefix: Option<String>,
}

impl ConfigOverrides {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds the env layer from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let natives_dir = lookup(ENV_NATIVES_DIR)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            natives_dir,
            accelerated: lookup(ENV_ACCELERATED).and_then(|v| parse_flag(ENV_ACCELERATED, &v)),
            log_decode: lookup(ENV_LOG_DECODE).and_then(|v| parse_flag(ENV_LOG_DECODE, &v)),
            temp_prefix: lookup(ENV_TEMP_PREFIX)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty()),
        }
    }

    #[inline]
    pub fn with_natives_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.natives_dir = Some(dir.into());
        self
    }

    #[inline]
    pub fn with_accelerated(mut self, on: bool) -> Self {
        self.accelerated = Some(on);
        self
    }

    #[inline]
    pub fn with_log_decode(mut self, on: bool) -> Self {
        self.log_decode = Some(on);
        self
    }
}

fn parse_flag(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        other => {
            log::warn!(target: "config", "ignoring {key}='{other}': expected 0/1/true/false");
            None
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads config with layering:
    /// defaults -> file -> env -> programmatic.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(
        file: Option<&Path>,
        programmatic: &ConfigOverrides,
    ) -> WuffsResult<(NativeConfig, ConfigLoadReport)> {
        Self::load_layered(file, &ConfigOverrides::from_env(), programmatic)
    }

    pub fn load_layered(
        file: Option<&Path>,
        env: &ConfigOverrides,
        programmatic: &ConfigOverrides,
    ) -> WuffsResult<(NativeConfig, ConfigLoadReport)> {
        let mut cfg = NativeConfig::default();
        let mut report = ConfigLoadReport::default();

        if let Some(path) = file.filter(|p| p.is_file()) {
            let data = fs::read_to_string(path).map_err(|e| {
                WuffsError::Config(format!("read failed: path={} err={e}", path.display()))
            })?;
            let parsed: RootJson = serde_json::from_str(&data).map_err(|e| {
                WuffsError::Config(format!("parse failed (json): path={} err={e}", path.display()))
            })?;

            apply_overrides(&mut cfg, &mut report, OverrideSource::File, &parsed.into_layer());

            cfg.source = ConfigSource::File {
                path: path.to_path_buf(),
            };
            report.source = cfg.source.clone();
            report.file = Some(path.to_path_buf());
        }

        apply_overrides(&mut cfg, &mut report, OverrideSource::Env, env);
        apply_overrides(
            &mut cfg,
            &mut report,
            OverrideSource::Programmatic,
            programmatic,
        );

        let mixed = report
            .overrides
            .iter()
            .any(|o| o.source != OverrideSource::File);
        if mixed {
            cfg.source = ConfigSource::Mixed;
            report.source = ConfigSource::Mixed;
        }

        Ok((cfg, report))
    }
}

#[derive(Deserialize, Default)]
struct RootJson {
    natives: Option<NativesJson>,
    logging: Option<LoggingJson>,
}

#[derive(Deserialize)]
struct NativesJson {
    dir: Option<String>,
    accelerated: Option<bool>,
    temp_prefix: Option<String>,
}

#[derive(Deserialize)]
struct LoggingJson {
    log_decode: Option<bool>,
}

impl RootJson {
    fn into_layer(self) -> ConfigOverrides {
        let mut layer = ConfigOverrides::empty();
        if let Some(n) = self.natives {
            layer.natives_dir = n.dir.filter(|d| !d.trim().is_empty()).map(PathBuf::from);
            layer.accelerated = n.accelerated;
            layer.temp_prefix = n.temp_prefix.filter(|p| !p.trim().is_empty());
        }
        if let Some(l) = self.logging {
            layer.log_decode = l.log_decode;
        }
        layer
    }
}

fn apply_overrides(
    cfg: &mut NativeConfig,
    report: &mut ConfigLoadReport,
    source: OverrideSource,
    layer: &ConfigOverrides,
) {
    if let Some(dir) = layer.natives_dir.clone() {
        let from = format_dir(cfg.natives_dir.as_deref());
        let to = dir.display().to_string();
        cfg.natives_dir = Some(dir);
        record(report, source, "natives_dir", from, to);
    }
    if let Some(v) = layer.accelerated {
        let from = cfg.accelerated.to_string();
        cfg.accelerated = v;
        record(report, source, "accelerated", from, v.to_string());
    }
    if let Some(v) = layer.log_decode {
        let from = cfg.log_decode.to_string();
        cfg.log_decode = v;
        record(report, source, "log_decode", from, v.to_string());
    }
    if let Some(v) = layer.temp_prefix.clone() {
        let from = std::mem::replace(&mut cfg.temp_prefix, v.clone());
        record(report, source, "temp_prefix", from, v);
    }
}

fn record(
    report: &mut ConfigLoadReport,
    source: OverrideSource,
    key: &'static str,
    from: String,
    to: String,
) {
    if from == to {
        return;
    }
    log::debug!(target: "config", "override {key}: '{from}' -> '{to}' ({source:?})");
    report.overrides.push(ConfigOverride {
        key,
        source,
        from,
        to,
    });
}

fn format_dir(p: Option<&Path>) -> String {
    p.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<none>".to_owned())
}

static GLOBAL: OnceLock<NativeConfig> = OnceLock::new();

/// Installs the process-wide config. Must happen before the first native load.
///
/// Returns the rejected config when one is already installed.
pub fn install(cfg: NativeConfig) -> Result<(), NativeConfig> {
    GLOBAL.set(cfg)
}

/// Process-wide config; loaded from `WUFFS_IMAGEIO_CONFIG` and the environment on first use.
pub fn global() -> &'static NativeConfig {
    GLOBAL.get_or_init(|| {
        let file = std::env::var_os(ENV_CONFIG_FILE).map(PathBuf::from);
        match ConfigLoader::load(file.as_deref(), &ConfigOverrides::empty()) {
            Ok((cfg, report)) => {
                log::debug!(
                    target: "config",
                    "config loaded: source={:?} overrides={}",
                    report.source,
                    report.overrides.len()
                );
                cfg
            }
            Err(e) => {
                log::warn!(target: "config", "config load failed, using defaults: {e}");
                NativeConfig::default()
            }
        }
    })
}
