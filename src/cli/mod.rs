//! CLI argument definitions.

pub mod parsers;

use autoballoon::config::{ControllerConfig, FileConfig};
use clap::{Args, ValueEnum};
use parsers::{parse_period, parse_size};
use std::path::PathBuf;

/// Controller settings from the command line.
///
/// Unset options fall back to the config file, then to built-in defaults.
#[derive(Args, Debug)]
pub struct ControlArgs {
    /// libvirt connection URI [default: qemu:///session].
    #[arg(short = 'c', long = "connect", value_name = "URI")]
    pub connect: Option<String>,

    /// Minimum allocated memory, KiB or with a K/M/G/T suffix [default: 2G].
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min: Option<u64>,

    /// Memory to keep free on top of current usage [default: 1G].
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub free: Option<u64>,

    /// Grow once the deficit exceeds this [default: 100M].
    #[arg(
        long = "min-threshold",
        alias = "minThreshold",
        value_name = "SIZE",
        value_parser = parse_size
    )]
    pub min_threshold: Option<u64>,

    /// Shrink once the surplus exceeds this [default: 200M].
    #[arg(
        long = "max-threshold",
        alias = "maxThreshold",
        value_name = "SIZE",
        value_parser = parse_size
    )]
    pub max_threshold: Option<u64>,

    /// How often to check for memory changes, 0 disables [default: 5].
    #[arg(short, long, value_name = "SECONDS", value_parser = parse_period)]
    pub period: Option<u64>,

    /// Config file (TOML). Defaults to the user config directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The domain name.
    pub vmname: String,
}

impl ControlArgs {
    /// Merge defaults, the config file and the command line.
    pub fn resolve(&self) -> autoballoon::Result<ControllerConfig> {
        let mut config = ControllerConfig::for_domain(&self.vmname);

        match &self.config {
            // An explicitly named file must load.
            Some(path) => config.apply_file(&FileConfig::load(path)?)?,
            None => {
                let mut layered = config.clone();
                let loaded = FileConfig::load_default()
                    .and_then(|file| file.map_or(Ok(()), |file| layered.apply_file(&file)));
                match loaded {
                    Ok(()) => config = layered,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to load config, using defaults")
                    }
                }
            }
        }

        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Overlay the options given on the command line.
    pub fn apply_overrides(&self, config: &mut ControllerConfig) {
        if let Some(uri) = &self.connect {
            config.uri = uri.clone();
        }
        if let Some(kib) = self.min {
            config.min_memory_kib = kib;
        }
        if let Some(kib) = self.free {
            config.free_margin_kib = kib;
        }
        if let Some(kib) = self.min_threshold {
            config.min_threshold_kib = kib;
        }
        if let Some(kib) = self.max_threshold {
            config.max_threshold_kib = kib;
        }
        if let Some(secs) = self.period {
            config.period_secs = secs;
        }
    }
}

/// Log verbosity.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    #[value(alias = "warning")]
    Warn,
    #[value(alias = "critical")]
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for this crate.
    pub fn directive(self) -> String {
        let level = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        format!("autoballoon={}", level)
    }
}

/// Log line format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}
