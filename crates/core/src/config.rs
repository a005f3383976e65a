//! Engine configuration
//!
//! Tunables for hit testing, calibration and overlay projection. Configuration
//! can be loaded from a JSON file, environment variables, or created
//! programmatically.

use crate::measure::COUNT_UNIT;
use std::fs;
use std::path::Path;

/// Tunable settings for a takeoff session
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selection radius around a measure, in canonical pixels
    pub hit_tolerance_px: f64,
    /// Minimum pixel length of a calibration reference segment
    pub calibration_epsilon_px: f64,
    /// Renderer scale at 100% zoom (canonical pixel → screen pixel)
    pub base_render_scale: f64,
    /// Unit label written on count measures
    pub count_unit: String,
    /// Unit price applied when the user has not set one
    pub default_unit_price: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hit_tolerance_px: 6.0,
            calibration_epsilon_px: 1.0,
            base_render_scale: 1.0,
            count_unit: COUNT_UNIT.to_string(),
            default_unit_price: 0.0,
        }
    }
}

impl EngineConfig {
    /// Sets the selection tolerance in canonical pixels.
    pub fn with_hit_tolerance(mut self, px: f64) -> Self {
        self.hit_tolerance_px = px;
        self
    }

    /// Sets the minimum calibration segment length.
    pub fn with_calibration_epsilon(mut self, px: f64) -> Self {
        self.calibration_epsilon_px = px;
        self
    }

    /// Sets the renderer's base scale.
    pub fn with_base_render_scale(mut self, scale: f64) -> Self {
        self.base_render_scale = scale;
        self
    }

    /// Sets the default unit price.
    pub fn with_default_unit_price(mut self, price: f64) -> Self {
        self.default_unit_price = price;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TAKEOFF_HIT_TOLERANCE_PX`: selection radius (default: 6)
    /// - `TAKEOFF_CALIBRATION_EPSILON_PX`: minimum reference length (default: 1)
    /// - `TAKEOFF_BASE_RENDER_SCALE`: renderer scale at 100% (default: 1)
    /// - `TAKEOFF_DEFAULT_UNIT_PRICE`: default price per unit (default: 0)
    ///
    /// # Errors
    /// Returns an error if any variable is not a valid number or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Overrides fields from a key lookup, typically the process environment.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| -> Result<Option<f64>, ConfigError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidValue(key.to_string())),
                None => Ok(None),
            }
        };

        if let Some(value) = read("TAKEOFF_HIT_TOLERANCE_PX")? {
            self.hit_tolerance_px = value;
        }
        if let Some(value) = read("TAKEOFF_CALIBRATION_EPSILON_PX")? {
            self.calibration_epsilon_px = value;
        }
        if let Some(value) = read("TAKEOFF_BASE_RENDER_SCALE")? {
            self.base_render_scale = value;
        }
        if let Some(value) = read("TAKEOFF_DEFAULT_UNIT_PRICE")? {
            self.default_unit_price = value;
        }

        self.validate()?;
        Ok(self)
    }

    /// Loads configuration from a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or holds bad values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Checks that every tunable is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.hit_tolerance_px.is_finite() && self.hit_tolerance_px >= 0.0) {
            return Err(ConfigError::InvalidValue("hit_tolerance_px".to_string()));
        }
        if !(self.calibration_epsilon_px.is_finite() && self.calibration_epsilon_px > 0.0) {
            return Err(ConfigError::InvalidValue("calibration_epsilon_px".to_string()));
        }
        if !(self.base_render_scale.is_finite() && self.base_render_scale > 0.0) {
            return Err(ConfigError::InvalidValue("base_render_scale".to_string()));
        }
        if !(self.default_unit_price.is_finite() && self.default_unit_price >= 0.0) {
            return Err(ConfigError::InvalidValue("default_unit_price".to_string()));
        }
        Ok(())
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.hit_tolerance_px, 6.0);
        assert_eq!(config.calibration_epsilon_px, 1.0);
        assert_eq!(config.count_unit, "unité");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_hit_tolerance(3.0)
            .with_base_render_scale(2.0)
            .with_default_unit_price(1.5);
        assert_eq!(config.hit_tolerance_px, 3.0);
        assert_eq!(config.base_render_scale, 2.0);
        assert_eq!(config.default_unit_price, 1.5);
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("TAKEOFF_HIT_TOLERANCE_PX", "10"),
            ("TAKEOFF_BASE_RENDER_SCALE", " 1.5 "),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.hit_tolerance_px, 10.0);
        assert_eq!(config.base_render_scale, 1.5);
        assert_eq!(config.calibration_epsilon_px, 1.0);
    }

    #[test]
    fn test_apply_env_rejects_garbage() {
        let result = EngineConfig::default().apply_env(|key| {
            (key == "TAKEOFF_CALIBRATION_EPSILON_PX").then(|| "abc".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(key)) if key == "TAKEOFF_CALIBRATION_EPSILON_PX"
        ));
    }

    #[test]
    fn test_apply_env_rejects_zero_epsilon() {
        let result = EngineConfig::default()
            .apply_env(|key| (key == "TAKEOFF_CALIBRATION_EPSILON_PX").then(|| "0".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(key)) if key == "calibration_epsilon_px"
        ));
        assert!(EngineConfig::default().with_calibration_epsilon(0.0).validate().is_err());
    }

    #[test]
    fn test_apply_env_rejects_zero_scale() {
        let result = EngineConfig::default()
            .apply_env(|key| (key == "TAKEOFF_BASE_RENDER_SCALE").then(|| "0".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("takeoff.json");

        let config = EngineConfig::default().with_hit_tolerance(4.0);
        config.save_to_file(&path).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("partial.json");
        fs::write(&path, r#"{ "base_render_scale": 2.0 }"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.base_render_scale, 2.0);
        assert_eq!(config.hit_tolerance_px, 6.0);
    }
}
