//! # Configuration Module
//!
//! Tunable parameters for matching, analysis and the metronome, stored as
//! JSON. Every field has a default so a partial file is enough.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::metronome::MetronomeSettings;
use crate::{Error, Result};

/// How the evaluator discards stray readings before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierStrategy {
    /// Keep only readings within the tolerance band around the target.
    #[default]
    PercentBand,
    /// Keep readings inside the 1.5×IQR fences of the batch itself.
    Quartiles,
}

/// Parameters of the pitch match evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Number of valid readings collected before a decision is made.
    pub batch_size: usize,
    /// Accepted relative deviation from the target (0.025 = ±2.5%).
    pub tolerance: f32,
    /// Readings quieter than this are ignored.
    pub amplitude_gate: f32,
    pub outlier_strategy: OutlierStrategy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            tolerance: 0.025,
            amplitude_gate: 0.3,
            outlier_strategy: OutlierStrategy::PercentBand,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size", self.batch_size, "must be at least 1"));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(Error::invalid("tolerance", self.tolerance, "must be between 0 and 1"));
        }
        if !(self.amplitude_gate >= 0.0) {
            return Err(Error::invalid("amplitude_gate", self.amplitude_gate, "must be non-negative"));
        }
        Ok(())
    }
}

/// Parameters of audio capture and the pitch tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Samples per analysis frame.
    pub frame_size: usize,
    /// Sample rate requested from the input device.
    pub preferred_sample_rate: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: crate::audio::BUFFER_SIZE,
            preferred_sample_rate: 44100,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 64 {
            return Err(Error::invalid("frame_size", self.frame_size, "must be at least 64 samples"));
        }
        if self.preferred_sample_rate == 0 {
            return Err(Error::invalid("preferred_sample_rate", self.preferred_sample_rate, "must be positive"));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchTapConfig {
    pub matching: MatchConfig,
    pub analysis: AnalysisConfig,
    pub metronome: MetronomeSettings,
}

impl PitchTapConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PitchTapConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("[CONFIG] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        tracing::info!("[CONFIG] Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.matching.validate()?;
        self.analysis.validate()?;
        self.metronome.validate()
    }
}
