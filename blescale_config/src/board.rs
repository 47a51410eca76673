//! Static board profile, read from TOML at start-up.
//!
//! Unlike the persisted parameters this file is never written by the node.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    /// HX711 data-out GPIO.
    pub hx711_dout: u8,
    /// HX711 clock GPIO.
    pub hx711_sck: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dout: 18,
            hx711_sck: 21,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Location of the persisted parameter document.
    pub config_path: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready (DOUT low) before failing
    pub sensor_read_timeout_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeCfg {
    /// Advertised device name.
    pub name: String,
}

impl Default for NodeCfg {
    fn default() -> Self {
        Self {
            name: String::from("blescale"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BoardConfig {
    pub pins: Pins,
    pub storage: Storage,
    pub logging: Logging,
    pub hardware: Hardware,
    pub node: NodeCfg,
}

pub fn load_toml(s: &str) -> Result<BoardConfig, toml::de::Error> {
    toml::from_str::<BoardConfig>(s)
}

impl BoardConfig {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.pins.hx711_dout == self.pins.hx711_sck {
            eyre::bail!("pins.hx711_dout and pins.hx711_sck must differ");
        }
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }
        if self.storage.config_path.as_os_str().is_empty() {
            eyre::bail!("storage.config_path must not be empty");
        }
        if self.node.name.is_empty() || self.node.name.len() > 29 {
            eyre::bail!("node.name must be 1..=29 bytes to fit an advertisement");
        }
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }
        Ok(())
    }
}
