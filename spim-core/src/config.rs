//! Device settings from TOML
//!
//! Devices are declared as `[spi.<name>]` tables:
//!
//! ```toml
//! [spi.flash]
//! host = "spi2"
//! miso = 19
//! mosi = 23
//! sclk = 18
//! cs = 5
//! hz = 10_000_000
//! mode = 0
//! cmd_addr_bits = 8
//! intr_transfer = true
//! ```
//!
//! Omitted fields take their [`SpiSettings::default`] values; `mosi` and
//! `sclk` are required. Leaving out `miso` selects 3-wire operation.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use serde::Deserialize;
use spim_hal::{InvalidMode, Mode, SpiHost};

use crate::settings::{SettingsError, SpiSettings};

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Malformed TOML or wrong field types
    Toml(String),
    /// Unknown host name
    InvalidHost(String),
    /// Mode outside 0-3
    InvalidMode(u8),
    /// A device's settings failed validation
    Settings {
        /// Device table name
        name: String,
        /// Validation failure
        error: SettingsError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Toml(msg) => write!(f, "TOML error: {}", msg),
            ConfigError::InvalidHost(host) => write!(f, "unknown SPI host '{}'", host),
            ConfigError::InvalidMode(mode) => write!(f, "invalid SPI mode {}", mode),
            ConfigError::Settings { name, error } => write!(f, "spi.{}: {}", name, error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    spi: BTreeMap<String, DeviceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceEntry {
    host: Option<String>,
    miso: Option<u8>,
    mosi: u8,
    sclk: u8,
    cs: Option<u8>,
    hz: Option<u32>,
    #[serde(default)]
    max_bytes: u32,
    #[serde(default)]
    mode: u8,
    #[serde(default)]
    delay_ns: u32,
    #[serde(default)]
    cmd_addr_bits: u8,
    #[serde(default)]
    intr_transfer: bool,
    #[serde(default)]
    half_duplex: bool,
    #[serde(default)]
    positive_cs: bool,
}

/// Parse a host name (`spi2`, `SPI3`, `hspi`, `vspi`, ...)
pub fn parse_host(name: &str) -> Result<SpiHost, ConfigError> {
    let name = name.trim();
    let hosts = [
        ("spi1", SpiHost::Spi1),
        ("spi2", SpiHost::Spi2),
        ("hspi", SpiHost::Spi2),
        ("spi3", SpiHost::Spi3),
        ("vspi", SpiHost::Spi3),
    ];
    hosts
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(name))
        .map(|(_, host)| *host)
        .ok_or_else(|| ConfigError::InvalidHost(name.to_string()))
}

impl DeviceEntry {
    fn into_settings(self) -> Result<SpiSettings, ConfigError> {
        let defaults = SpiSettings::default();
        let host = match &self.host {
            Some(name) => parse_host(name)?,
            None => defaults.host,
        };
        let mode =
            Mode::try_from(self.mode).map_err(|InvalidMode(n)| ConfigError::InvalidMode(n))?;

        Ok(SpiSettings {
            host,
            miso: self.miso,
            mosi: self.mosi,
            sclk: self.sclk,
            cs: self.cs,
            hz: self.hz.unwrap_or(defaults.hz),
            max_bytes: self.max_bytes,
            mode,
            delay_ns: self.delay_ns,
            cmd_addr_bits: self.cmd_addr_bits,
            intr_transfer: self.intr_transfer,
            half_duplex: self.half_duplex,
            positive_cs: self.positive_cs,
        })
    }
}

/// Parse every `[spi.<name>]` table, sorted by name
///
/// Each entry is validated; the first invalid entry is reported.
pub fn parse_settings(input: &str) -> Result<Vec<(String, SpiSettings)>, ConfigError> {
    let file: ConfigFile =
        toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;

    let mut devices = Vec::with_capacity(file.spi.len());
    for (name, entry) in file.spi {
        let settings = entry.into_settings()?;
        if let Err(error) = settings.validate() {
            warn!("SPI device {=str} rejected", name.as_str());
            return Err(ConfigError::Settings { name, error });
        }
        devices.push((name, settings));
    }

    debug!("Parsed {} SPI device configs", devices.len());
    Ok(devices)
}
