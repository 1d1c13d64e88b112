//! Navigation configuration
//!
//! Supports saving and loading settings in RON (Rusty Object Notation) and
//! JSON formats.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ai::{Heuristic, Probe, SteeringParams};

/// Tuning for the path planning and following layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Search cycles the path manager hands out per tick
    pub searches_per_cycle: usize,
    /// A* distance estimate
    pub heuristic: Heuristic,
    /// Line-of-sight probe used by planners and path smoothing
    pub probe: Probe,
    /// Seek/arrive tuning for edge traversal
    pub steering: SteeringParams,
    /// Cut corners while following when the way ahead is clear
    pub smooth_paths: bool,
    /// Brake to a stop at the end of a path
    pub stop_at_end: bool,
    /// Seconds a blocked agent waits before asking again
    pub retry_delay: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            searches_per_cycle: 10,
            heuristic: Heuristic::Euclidean,
            probe: Probe::default(),
            steering: SteeringParams::default(),
            smooth_paths: true,
            stop_at_end: true,
            retry_delay: 1.0,
        }
    }
}

impl AiConfig {
    /// Set the per-tick search budget
    #[must_use]
    pub fn with_searches_per_cycle(mut self, budget: usize) -> Self {
        self.searches_per_cycle = budget;
        self
    }

    /// Set the A* heuristic
    #[must_use]
    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Set the line-of-sight probe
    #[must_use]
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    /// Set steering tuning
    #[must_use]
    pub fn with_steering(mut self, steering: SteeringParams) -> Self {
        self.steering = steering;
        self
    }

    /// Enable or disable path smoothing
    #[must_use]
    pub fn with_smoothing(mut self, enabled: bool) -> Self {
        self.smooth_paths = enabled;
        self
    }

    /// Choose whether agents stop at the end of a path
    #[must_use]
    pub fn with_stop_at_end(mut self, stop: bool) -> Self {
        self.stop_at_end = stop;
        self
    }

    /// Set the retry delay in seconds
    #[must_use]
    pub fn with_retry_delay(mut self, seconds: f32) -> Self {
        self.retry_delay = seconds;
        self
    }

    /// Save the configuration to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse a configuration from RON text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        ron::from_str(content).map_err(|e| ConfigError::DeserializeError(e.to_string()))
    }

    /// Save the configuration to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::DeserializeError(e.to_string()))
    }
}

/// Errors that can occur while loading or saving configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File I/O error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::LayerMask;

    #[test]
    fn test_builders() {
        let config = AiConfig::default()
            .with_searches_per_cycle(3)
            .with_heuristic(Heuristic::Manhattan)
            .with_probe(Probe::new(0.5, LayerMask::STATIC))
            .with_smoothing(false)
            .with_stop_at_end(false)
            .with_retry_delay(2.5);

        assert_eq!(config.searches_per_cycle, 3);
        assert_eq!(config.heuristic, Heuristic::Manhattan);
        assert_eq!(config.probe.layers, LayerMask::STATIC);
        assert!(!config.smooth_paths);
        assert!(!config.stop_at_end);
        assert_eq!(config.retry_delay, 2.5);
    }

    #[test]
    fn test_ron_file_roundtrip() {
        let config = AiConfig::default()
            .with_searches_per_cycle(42)
            .with_heuristic(Heuristic::Zero);

        let path = std::env::temp_dir().join("pathcycle_config_test.ron");
        config.save_ron(&path).unwrap();
        let loaded = AiConfig::load_ron(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let config = AiConfig::default().with_retry_delay(0.25);

        let path = std::env::temp_dir().join("pathcycle_config_test.json");
        config.save_json(&path).unwrap();
        let loaded = AiConfig::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config =
            AiConfig::from_ron_str("(searches_per_cycle: 4, smooth_paths: false)").unwrap();
        assert_eq!(config.searches_per_cycle, 4);
        assert!(!config.smooth_paths);
        assert_eq!(config.retry_delay, AiConfig::default().retry_delay);
        assert_eq!(config.steering, SteeringParams::default());
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            AiConfig::load_ron("/nonexistent/pathcycle.ron"),
            Err(ConfigError::IoError(_))
        ));
        assert!(matches!(
            AiConfig::from_ron_str("(searches_per_cycle: \"many\")"),
            Err(ConfigError::DeserializeError(_))
        ));
    }
}
