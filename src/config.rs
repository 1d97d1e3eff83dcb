//! Controller configuration.
//!
//! Settings come from three layers, lowest priority first: built-in
//! defaults, an optional TOML file, and the command line. The merged
//! [`ControllerConfig`] is validated once and never mutated afterwards.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application name for config file storage.
const APP_NAME: &str = "autoballoon";

/// Config file name inside the application config directory.
const CONFIG_FILE: &str = "config.toml";

/// KiB per MiB.
pub const MIB: u64 = 1024;

/// KiB per GiB.
pub const GIB: u64 = 1024 * MIB;

/// Default libvirt connection URI.
pub const DEFAULT_URI: &str = "qemu:///session";

/// Default allocation floor (2 GiB).
pub const DEFAULT_MIN_MEMORY_KIB: u64 = 2 * GIB;

/// Default free margin (1 GiB).
pub const DEFAULT_FREE_MARGIN_KIB: u64 = GIB;

/// Default grow threshold (100 MiB).
pub const DEFAULT_MIN_THRESHOLD_KIB: u64 = 100 * MIB;

/// Default shrink threshold (200 MiB).
pub const DEFAULT_MAX_THRESHOLD_KIB: u64 = 200 * MIB;

/// Default poll period in seconds.
pub const DEFAULT_PERIOD_SECS: u64 = 5;

/// Immutable settings for one controller run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// libvirt connection URI.
    pub uri: String,

    /// Name of the domain to balloon.
    pub domain: String,

    /// Allocation floor in KiB.
    pub min_memory_kib: u64,

    /// Memory kept free on top of current usage, in KiB.
    pub free_margin_kib: u64,

    /// Growth is requested once the deficit exceeds this many KiB.
    pub min_threshold_kib: u64,

    /// Shrinking is requested once the surplus exceeds this many KiB.
    pub max_threshold_kib: u64,

    /// Seconds between polls. Zero disables the controller.
    pub period_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            domain: String::new(),
            min_memory_kib: DEFAULT_MIN_MEMORY_KIB,
            free_margin_kib: DEFAULT_FREE_MARGIN_KIB,
            min_threshold_kib: DEFAULT_MIN_THRESHOLD_KIB,
            max_threshold_kib: DEFAULT_MAX_THRESHOLD_KIB,
            period_secs: DEFAULT_PERIOD_SECS,
        }
    }
}

impl ControllerConfig {
    /// Create a configuration for `domain` with default settings.
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Overlay the values set in a config file.
    pub fn apply_file(&mut self, file: &FileConfig) -> Result<()> {
        if let Some(uri) = &file.connect {
            self.uri = uri.clone();
        }
        if let Some(size) = &file.min {
            self.min_memory_kib = size.to_kib()?;
        }
        if let Some(size) = &file.free {
            self.free_margin_kib = size.to_kib()?;
        }
        if let Some(size) = &file.min_threshold {
            self.min_threshold_kib = size.to_kib()?;
        }
        if let Some(size) = &file.max_threshold {
            self.max_threshold_kib = size.to_kib()?;
        }
        if let Some(period) = file.period {
            self.period_secs = period;
        }
        Ok(())
    }

    /// Check the configuration before the controller starts.
    pub fn validate(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(Error::config("connection URI must not be empty"));
        }

        if self.domain.trim().is_empty() {
            return Err(Error::config("domain name must not be empty"));
        }

        if self.min_memory_kib == 0 {
            return Err(Error::config("minimum memory must be greater than zero"));
        }

        // The resize arithmetic is signed.
        let sizes = [
            ("minimum memory", self.min_memory_kib),
            ("free margin", self.free_margin_kib),
            ("min threshold", self.min_threshold_kib),
            ("max threshold", self.max_threshold_kib),
        ];
        for (what, kib) in sizes {
            if i64::try_from(kib).is_err() {
                return Err(Error::config(format!("{} too large: {} KiB", what, kib)));
            }
        }

        if self.min_threshold_kib == 0 && self.max_threshold_kib == 0 {
            tracing::warn!("both thresholds are zero, the balloon will be resized on every change");
        }

        Ok(())
    }

    /// Poll period as a duration.
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.period_secs)
    }

    /// Whether polling is disabled.
    pub fn is_disabled(&self) -> bool {
        self.period_secs == 0
    }
}

/// A size in a config file: plain KiB or a suffixed string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    /// Size in KiB.
    Kib(u64),
    /// Size with a unit suffix, e.g. `"2G"`.
    Text(String),
}

impl SizeValue {
    /// Resolve to KiB.
    pub fn to_kib(&self) -> Result<u64> {
        match self {
            SizeValue::Kib(kib) => Ok(*kib),
            SizeValue::Text(text) => parse_size_kib(text).map_err(Error::Config),
        }
    }
}

/// On-disk configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// libvirt connection URI.
    pub connect: Option<String>,
    /// Allocation floor.
    pub min: Option<SizeValue>,
    /// Free margin.
    pub free: Option<SizeValue>,
    /// Grow threshold.
    #[serde(alias = "minThreshold")]
    pub min_threshold: Option<SizeValue>,
    /// Shrink threshold.
    #[serde(alias = "maxThreshold")]
    pub max_threshold: Option<SizeValue>,
    /// Poll period in seconds.
    pub period: Option<u64>,
}

impl FileConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the config file from the default location.
    ///
    /// Returns `None` if there is no config directory or no file in it.
    pub fn load_default() -> Result<Option<Self>> {
        match default_path() {
            Some(path) if path.exists() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }
}

/// Default config file location, e.g. `~/.config/autoballoon/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

/// Parse a memory size into KiB.
///
/// Plain numbers are KiB. Binary suffixes `K`, `M`, `G`, `T` are accepted
/// with or without `iB`, in any case.
pub fn parse_size_kib(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    if number.is_empty() {
        return Err(format!("invalid size: {:?}", s));
    }

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid size: {:?}", s))?;

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "k" | "kib" => 1,
        "m" | "mib" => MIB,
        "g" | "gib" => GIB,
        "t" | "tib" => 1024 * GIB,
        other => return Err(format!("unknown size suffix {:?} in {:?}", other, s)),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {:?}", s))
}
