//! Configuration validation with range checks.

use crate::coords::Coordinate;
use crate::error::ConfigError;

use super::Config;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// The mandatory object name is checked when job settings are built, so a
    /// config file may leave it to the command line.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fits = &self.fits;
        if fits.teleaper < 0.0 || fits.telefoc < 0.0 {
            return Err(ConfigError::ValidationError(
                "fits.teleaper and fits.telefoc must be >= 0".into(),
            ));
        }
        if fits.exposure < 0.0 {
            return Err(ConfigError::ValidationError(
                "fits.exposure must be >= 0".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&fits.sitelat) {
            return Err(ConfigError::ValidationError(
                "fits.sitelat must be between -90 and 90".into(),
            ));
        }
        if !(-180.0..=360.0).contains(&fits.sitelon) {
            return Err(ConfigError::ValidationError(
                "fits.sitelon must be between -180 and 360".into(),
            ));
        }

        let coords = &fits.object_coordinates;
        for (field, value) in [("ra", &coords.ra), ("dec", &coords.dec)] {
            if !value.trim().is_empty() {
                Coordinate::parse(value).map_err(|e| {
                    ConfigError::ValidationError(format!("fits.object_coordinates.{field}: {e}"))
                })?;
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_coordinates() {
        let mut config = Config::default();
        config.fits.object_coordinates.dec = "41:99:00".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("object_coordinates.dec"));
    }

    #[test]
    fn test_validate_rejects_site_latitude() {
        let mut config = Config::default();
        config.fits.sitelat = 91.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sitelat"));
    }

    #[test]
    fn test_validate_rejects_negative_exposure() {
        let mut config = Config::default();
        config.fits.exposure = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.format"));

        config.logging.format = "json".into();
        config.logging.level = "loud".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }
}
