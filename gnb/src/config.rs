//! Configuration file of the UCI gNodeB
//!
//! One file holds the cell (MAC) configuration, the dedicated configuration of
//! every UE to admit and the behaviour of the simulated UEs. YAML and TOML are
//! both accepted, picked by file extension.

use anyhow::{anyhow, Context};
use layers::mac::{MacConfig, UeConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GnbConfig {
    /// Cell configuration
    pub cell: MacConfig,
    /// UEs connected at start-up
    #[serde(default)]
    pub ues: Vec<UeConfig>,
    /// Simulated UE feedback
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Behaviour of the simulated UEs answering the PUCCH requests
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Slot duration of the slot clock in microseconds, 0 runs unpaced.
    /// Defaults to the nominal duration of the cell's numerology.
    pub slot_duration_us: Option<u64>,
    /// Frames to run, 0 runs until interrupted
    pub num_frames: u32,
    /// A PDSCH is sent to every UE every this many DL slots
    pub dl_period_slots: u32,
    /// Every n-th HARQ bit is a NACK, 0 never
    pub nack_every: u32,
    /// Every n-th format 0/1 reception is not detected, 0 never
    pub dtx_every: u32,
    /// The UEs raise an SR on every n-th SR occasion, 0 never
    pub sr_every: u32,
    /// Reported UL SINR (0.5 dB steps, 64 dB offset)
    pub ul_cqi: u8,
    /// Reported RSSI (0.1 dB steps, 0 = -128 dBFS)
    pub rssi: Option<u16>,
    /// RSRP index of simulated beam reports
    pub rsrp_index: u8,
    /// SINR index of simulated beam reports
    pub sinr_index: u8,
    /// Wideband CQI of simulated CSI reports
    pub cqi: u8,
    /// Seconds between statistics reports
    pub stats_interval_s: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            slot_duration_us: None,
            num_frames: 0,
            dl_period_slots: 1,
            nack_every: 10,
            dtx_every: 0,
            sr_every: 4,
            ul_cqi: 168,
            rssi: None,
            rsrp_index: 80,
            sinr_index: 60,
            cqi: 12,
            stats_interval_s: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GnbConfig {
    /// Load configuration from a YAML (`.yml`, `.yaml`) or TOML (`.toml`) file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let config = match extension {
            "yml" | "yaml" => Self::from_yaml_str(&contents)?,
            "toml" => Self::from_toml_str(&contents)?,
            other => return Err(anyhow!("Unsupported configuration format: {:?}", other)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Cross checks the MAC does not do on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        for (i, ue) in self.ues.iter().enumerate() {
            if self.ues[..i].iter().any(|other| other.rnti == ue.rnti) {
                return Err(anyhow!("UE {} configured twice", ue.rnti));
            }
            ue.validate()?;
        }
        if self.ues.len() > self.cell.max_ues {
            return Err(anyhow!(
                "{} UEs configured, cell admits {}",
                self.ues.len(),
                self.cell.max_ues
            ));
        }
        if self.simulation.dl_period_slots == 0 {
            return Err(anyhow!("dl_period_slots must be at least 1"));
        }
        Ok(())
    }
}
