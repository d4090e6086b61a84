use serde::{Deserialize, Serialize};

use super::checkpoint::AxisWeights;

/// Main configuration structure for Resonance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Refinement loop configuration
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Evaluator service endpoint
    #[serde(default = "default_evaluator_endpoint")]
    pub evaluator: EndpointConfig,

    /// Fix-applier service endpoint
    #[serde(default = "default_fix_applier_endpoint")]
    pub fix_applier: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refinement: RefinementConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            evaluator: default_evaluator_endpoint(),
            fix_applier: default_fix_applier_endpoint(),
        }
    }
}

/// Refinement loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RefinementConfig {
    /// Maximum number of re-analysis iterations per session
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Overall score at or above which a treatment is ready for production
    #[serde(default = "default_ready_threshold")]
    pub ready_threshold: u32,

    /// Checkpoint score assumed for a fixed but not yet verified checkpoint
    #[serde(default = "default_optimistic_override_score")]
    pub optimistic_override_score: f64,

    /// Axis weights for the overall score
    #[serde(default)]
    pub weights: AxisWeights,
}

const fn default_max_iterations() -> u32 {
    5
}

const fn default_ready_threshold() -> u32 {
    80
}

const fn default_optimistic_override_score() -> f64 {
    8.0
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            ready_threshold: default_ready_threshold(),
            optimistic_override_score: default_optimistic_override_score(),
            weights: AxisWeights::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".resonance/resonance.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// HTTP endpoint of an external collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointConfig {
    /// Full URL requests are posted to
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// API key (read from `RESONANCE_API_KEY` when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

const fn default_timeout_secs() -> u64 {
    120
}

fn default_evaluator_endpoint() -> EndpointConfig {
    EndpointConfig::new("http://localhost:3000/api/analyze-resonance")
}

fn default_fix_applier_endpoint() -> EndpointConfig {
    EndpointConfig::new("http://localhost:3000/api/apply-resonance-fix")
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }

    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("RESONANCE_API_KEY").ok())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        default_evaluator_endpoint()
    }
}
