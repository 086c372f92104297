//! Startup configuration for the spatial index.
//!
//! Coordinates are interpreted in the configured spatial reference system and
//! stored with the configured precision model.
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// How coordinates are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionModel {
    /// Full `f64` precision, no snapping.
    #[default]
    Floating,
}

/// Spatial index configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Spatial reference identifier (EPSG code) of stored coordinates.
    #[serde(default = "Config::default_srid")]
    pub srid: i32,

    #[serde(default)]
    pub precision_model: PrecisionModel,
}

impl Config {
    const fn default_srid() -> i32 {
        4326
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn with_precision_model(mut self, model: PrecisionModel) -> Self {
        self.precision_model = model;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.srid <= 0 {
            return Err(format!(
                "Spatial reference id must be positive, got {}",
                self.srid
            ));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            srid: Self::default_srid(),
            precision_model: PrecisionModel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.srid, 4326);
        assert_eq!(config.precision_model, PrecisionModel::Floating);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default().with_srid(3857);

        let json = config.to_json().unwrap();
        assert!(json.contains("\"floating\""));
        let deserialized = Config::from_json(&json).unwrap();

        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_config_defaults_missing_fields() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(Config::from_json(r#"{"srid": 4326, "precision": "fixed"}"#).is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default().with_srid(0);
        assert!(config.validate().is_err());
        assert!(Config::from_json(r#"{"srid": -1}"#).is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml() {
        let config = Config::from_toml("srid = 3857\nprecision_model = \"floating\"\n").unwrap();
        assert_eq!(config.srid, 3857);
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
