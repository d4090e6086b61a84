use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;
use tracing::warn;

use crate::domain::models::config::{Config, EndpointConfig};
use crate::domain::models::{Axis, MAX_CHECKPOINT_SCORE};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid ready_threshold: {0}. Must be at most 100")]
    InvalidReadyThreshold(u32),

    #[error("Invalid optimistic_override_score: {0}. Must be between 0 and 10")]
    InvalidOverrideScore(f64),

    #[error("Invalid weight for {axis}: {weight}. Weights cannot be negative")]
    NegativeWeight { axis: String, weight: f64 },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {name} endpoint: {reason}")]
    InvalidEndpoint { name: String, reason: String },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .resonance/config.yaml (project config)
    /// 3. .resonance/local.yaml (project local overrides, optional)
    /// 4. Environment variables (RESONANCE_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".resonance/config.yaml"))
            .merge(Yaml::file(".resonance/local.yaml"))
            .merge(Env::prefixed("RESONANCE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let refinement = &config.refinement;
        if refinement.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(refinement.max_iterations));
        }
        if refinement.ready_threshold > 100 {
            return Err(ConfigError::InvalidReadyThreshold(refinement.ready_threshold));
        }
        if !(0.0..=MAX_CHECKPOINT_SCORE).contains(&refinement.optimistic_override_score) {
            return Err(ConfigError::InvalidOverrideScore(refinement.optimistic_override_score));
        }

        for axis in Axis::ALL {
            let weight = refinement.weights.get(axis);
            if weight < 0.0 || weight.is_nan() {
                return Err(ConfigError::NegativeWeight {
                    axis: axis.as_str().to_string(),
                    weight,
                });
            }
        }
        // Tolerated: the overall score is clamped either way.
        if !refinement.weights.is_normalized() {
            warn!(sum = refinement.weights.sum(), "axis weights do not sum to 1.0");
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Self::validate_endpoint("evaluator", &config.evaluator)?;
        Self::validate_endpoint("fix_applier", &config.fix_applier)?;

        Ok(())
    }

    fn validate_endpoint(name: &str, endpoint: &EndpointConfig) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
            return Err(invalid("url must start with http:// or https://"));
        }
        if endpoint.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AxisWeights;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refinement.max_iterations, 5);
        assert_eq!(config.refinement.ready_threshold, 80);
        assert_eq!(config.database.path, ".resonance/resonance.db");
        assert_eq!(config.logging.level, "info");
        assert!(config.fix_applier.url.ends_with("apply-resonance-fix"));
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
refinement:
  max_iterations: 3
  ready_threshold: 75
  weights:
    originality: 0.3
    character_depth: 0.2
    pacing: 0.2
    genre_fidelity: 0.1
    commercial_viability: 0.2
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
evaluator:
  url: https://eval.example.com/analyze
  timeout_secs: 30
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.refinement.max_iterations, 3);
        assert_eq!(config.refinement.ready_threshold, 75);
        assert!((config.refinement.weights.originality - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.evaluator.timeout_secs, 30);
        assert!(config.fix_applier.url.ends_with("apply-resonance-fix"));

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "refinement:\n  ready_threshold: 85").unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.refinement.ready_threshold, 85);
        assert_eq!(config.refinement.max_iterations, 5);
    }

    #[test]
    fn test_env_overrides_defaults() {
        temp_env::with_vars(
            [
                ("RESONANCE_REFINEMENT__READY_THRESHOLD", Some("90")),
                ("RESONANCE_LOGGING__LEVEL", Some("warn")),
            ],
            || {
                let config = ConfigLoader::load().unwrap();
                assert_eq!(config.refinement.ready_threshold, 90);
                assert_eq!(config.logging.level, "warn");
            },
        );
    }

    #[test]
    fn test_api_key_falls_back_to_env() {
        temp_env::with_var("RESONANCE_API_KEY", Some("secret"), || {
            let endpoint = EndpointConfig::new("http://localhost:3000/api/analyze-resonance");
            assert_eq!(endpoint.get_api_key().as_deref(), Some("secret"));

            let explicit = EndpointConfig {
                api_key: Some("explicit".to_string()),
                ..endpoint
            };
            assert_eq!(explicit.get_api_key().as_deref(), Some("explicit"));
        });
    }

    #[test]
    fn test_validate_zero_iterations() {
        let mut config = Config::default();
        config.refinement.max_iterations = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxIterations(0)
        ));
    }

    #[test]
    fn test_validate_threshold_above_100() {
        let mut config = Config::default();
        config.refinement.ready_threshold = 101;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidReadyThreshold(101)
        ));
    }

    #[test]
    fn test_validate_override_score_out_of_range() {
        let mut config = Config::default();
        config.refinement.optimistic_override_score = 11.0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidOverrideScore(_)
        ));
    }

    #[test]
    fn test_validate_negative_weight() {
        let mut config = Config::default();
        config.refinement.weights.pacing = -0.1;
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::NegativeWeight { axis, .. } => assert_eq!(axis, "pacing"),
            other => panic!("Expected NegativeWeight error, got {other:?}"),
        }
    }

    #[test]
    fn test_unnormalized_weights_are_tolerated() {
        let mut config = Config::default();
        config.refinement.weights = AxisWeights {
            originality: 0.5,
            character_depth: 0.5,
            pacing: 0.5,
            genre_fidelity: 0.5,
            commercial_viability: 0.5,
        };
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            _ => panic!("Expected InvalidLogLevel error"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            _ => panic!("Expected InvalidLogFormat error"),
        }
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_bad_endpoint_url() {
        let mut config = Config::default();
        config.evaluator.url = "localhost:3000".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidEndpoint { name, .. } => assert_eq!(name, "evaluator"),
            other => panic!("Expected InvalidEndpoint error, got {other:?}"),
        }
    }
}
