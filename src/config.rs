//! Engine configuration
//!
//! Loaded from JSON; every field has a default so a partial file (or `{}`)
//! is valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channel::PitchModel;
use crate::tables::{CPU_CLOCK_NTSC, CPU_CLOCK_PAL};
use crate::{Error, Result};

/// Highest number of N163 voices
pub const MAX_N163_CHANNELS: u8 = 8;

/// Console region, selects the CPU clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    /// 60 Hz, 1.789773 MHz
    #[default]
    Ntsc,
    /// 50 Hz, 1.662607 MHz
    Pal,
}

/// Settings shared by every channel of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pitch model used for slides and period computation
    pub pitch_model: PitchModel,
    /// Number of active N163 voices (1-8)
    pub n163_channels: u8,
    /// Console region
    pub machine: Machine,
    /// Reference frequency of A-4 in Hz
    pub a4_frequency: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pitch_model: PitchModel::Classic,
            n163_channels: 1,
            machine: Machine::Ntsc,
            a4_frequency: 440.0,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_N163_CHANNELS).contains(&self.n163_channels) {
            return Err(Error::InvalidConfig(format!(
                "n163_channels must be 1-{MAX_N163_CHANNELS}, got {}",
                self.n163_channels
            )));
        }
        if !(self.a4_frequency.is_finite() && self.a4_frequency > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "a4_frequency must be positive, got {}",
                self.a4_frequency
            )));
        }
        Ok(())
    }

    /// CPU clock in Hz for the configured machine
    pub fn cpu_clock(&self) -> f64 {
        match self.machine {
            Machine::Ntsc => CPU_CLOCK_NTSC,
            Machine::Pal => CPU_CLOCK_PAL,
        }
    }

    /// Set the pitch model
    pub fn pitch_model(mut self, model: PitchModel) -> Self {
        self.pitch_model = model;
        self
    }

    /// Set the N163 voice count
    pub fn n163_channels(mut self, count: u8) -> Self {
        self.n163_channels = count;
        self
    }

    /// Set the console region
    pub fn machine(mut self, machine: Machine) -> Self {
        self.machine = machine;
        self
    }

    /// Set the A-4 reference
    pub fn a4_frequency(mut self, hz: f64) -> Self {
        self.a4_frequency = hz;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config =
            EngineConfig::from_json_str(r#"{"pitch_model": "linear", "machine": "pal"}"#).unwrap();
        assert_eq!(config.pitch_model, PitchModel::Linear);
        assert_eq!(config.n163_channels, 1);
        assert_eq!(config.cpu_clock(), CPU_CLOCK_PAL);
    }

    #[test]
    fn test_rejects_channel_count() {
        let err = EngineConfig::from_json_str(r#"{"n163_channels": 9}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(EngineConfig::default().n163_channels(0).validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = EngineConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let config = EngineConfig::default()
            .pitch_model(PitchModel::Linear)
            .n163_channels(4);
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }
}
