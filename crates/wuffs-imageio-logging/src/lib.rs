use std::io::Write;

use env_logger::fmt::style::Style;
use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use thiserror::Error;

pub const ENV_LEVEL: &str = "WUFFS_IMAGEIO_LOG";
pub const ENV_COLORS: &str = "WUFFS_IMAGEIO_LOG_COLORS";
pub const ENV_MODULE: &str = "WUFFS_IMAGEIO_LOG_MODULE";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logger init failed: {0}")]
    Init(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLoggerConfig {
    pub level: LevelFilter,
    pub colors: bool,
    /// Prefix each line with the log target (`natives`, `ffi`, `decode`, ...).
    pub include_target: bool,
}

impl ConsoleLoggerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = lookup(ENV_LEVEL)
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);
        let colors = lookup(ENV_COLORS).map(|v| v != "0").unwrap_or(true);
        let include_target = lookup(ENV_MODULE).map(|v| v != "0").unwrap_or(true);

        Self {
            level,
            colors,
            include_target,
        }
    }

    #[inline]
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }
}

impl Default for ConsoleLoggerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Builds the console logger without installing it.
pub fn build_console_logger(config: &ConsoleLoggerConfig) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(config.level);
    builder.write_style(if config.colors {
        WriteStyle::Auto
    } else {
        WriteStyle::Never
    });

    let config = config.clone();
    builder.format(move |buf, record| {
        let style = if config.colors {
            buf.default_level_style(record.level())
        } else {
            Style::new()
        };

        if config.include_target {
            writeln!(
                buf,
                "[{style}{:<5}{style:#}] {:<10} {}",
                record.level(),
                record.target(),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "[{style}{:<5}{style:#}] {}",
                record.level(),
                record.args()
            )
        }
    });

    builder
}

/// Installs the console logger as the global `log` backend. Fails if one is already set.
pub fn init_console_logger(config: &ConsoleLoggerConfig) -> Result<(), LoggingError> {
    build_console_logger(config).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let c = ConsoleLoggerConfig::from_lookup(lookup_of(&[]));
        assert_eq!(c.level, LevelFilter::Info);
        assert!(c.colors);
        assert!(c.include_target);
    }

    #[test]
    fn env_overrides() {
        let c = ConsoleLoggerConfig::from_lookup(lookup_of(&[
            (ENV_LEVEL, "debug"),
            (ENV_COLORS, "0"),
            (ENV_MODULE, "0"),
        ]));
        assert_eq!(c.level, LevelFilter::Debug);
        assert!(!c.colors);
        assert!(!c.include_target);
    }

    #[test]
    fn bad_level_falls_back_to_info() {
        let c = ConsoleLoggerConfig::from_lookup(lookup_of(&[(ENV_LEVEL, "loud")]));
        assert_eq!(c.level, LevelFilter::Info);
    }

    #[test]
    fn second_init_fails() {
        let c = ConsoleLoggerConfig::from_lookup(lookup_of(&[])).with_level(LevelFilter::Off);
        let _ = init_console_logger(&c);
        assert!(matches!(init_console_logger(&c), Err(LoggingError::Init(_))));
    }
}
