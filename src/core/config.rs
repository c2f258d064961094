//! Configuration management for the metrics core.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Reader and view definitions
//! - Validation and defaults

use crate::core::types::{AggregationType, Temporality};
use crate::core::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Bucket boundaries used when no view overrides them.
pub const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0,
    7500.0, 10000.0,
];

/// Complete configuration for the metrics core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aggregation defaults
    pub aggregation: AggregationSettings,
    /// Storage limits
    pub storage: StorageConfig,
    /// Metric readers, one child storage set per reader
    pub readers: Vec<ReaderConfig>,
    /// Views selecting aggregation and attribute filtering per instrument
    pub views: Vec<ViewConfig>,
    /// Collection cycle settings
    pub collection: CollectionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Aggregation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Histogram bucket boundaries when a view does not set its own
    pub histogram_boundaries: Vec<f64>,
    /// Track min/max in histograms
    pub record_min_max: bool,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum attribute sets per storage, including the overflow series
    pub cardinality_limit: usize,
}

/// A metric reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Unique reader name, used to select it at collection time
    pub name: String,
    /// Temporality of the points this reader exports
    #[serde(default)]
    pub temporality: Temporality,
}

/// A view applied to matching instruments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Instrument name this view applies to, `*` for every instrument
    pub instrument_name: String,
    /// Aggregation override
    #[serde(default)]
    pub aggregation: AggregationType,
    /// Attribute keys kept on recorded measurements, all when unset
    #[serde(default)]
    pub attribute_keys: Option<Vec<String>>,
    /// Histogram boundaries for this view
    #[serde(default)]
    pub histogram_boundaries: Option<Vec<f64>>,
}

/// Collection cycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Collections slower than this are logged as warnings
    #[serde(with = "humantime_serde")]
    pub slow_threshold: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            aggregation: AggregationSettings::default(),
            storage: StorageConfig::default(),
            readers: vec![ReaderConfig::default()],
            views: Vec::new(),
            collection: CollectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        AggregationSettings {
            histogram_boundaries: DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
            record_min_max: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            cardinality_limit: 2000,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            name: "default".to_string(),
            temporality: Temporality::Cumulative,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            slow_threshold: Duration::from_secs(1),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl ViewConfig {
    /// View matching every instrument with the given aggregation.
    pub fn new(instrument_name: impl Into<String>, aggregation: AggregationType) -> Self {
        ViewConfig {
            instrument_name: instrument_name.into(),
            aggregation,
            attribute_keys: None,
            histogram_boundaries: None,
        }
    }

    /// Whether this view applies to `instrument_name`.
    pub fn matches(&self, instrument_name: &str) -> bool {
        self.instrument_name == "*" || self.instrument_name == instrument_name
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_boundaries(&self.aggregation.histogram_boundaries)?;

        if self.storage.cardinality_limit == 0 {
            return Err(MetricsError::config("cardinality_limit must be greater than 0"));
        }

        if self.readers.is_empty() {
            return Err(MetricsError::config("at least one reader must be configured"));
        }

        let mut names = HashSet::new();
        for reader in &self.readers {
            if !names.insert(reader.name.as_str()) {
                return Err(MetricsError::config(format!(
                    "Duplicate reader name '{}'",
                    reader.name
                )));
            }
        }

        for view in &self.views {
            if view.instrument_name.is_empty() {
                return Err(MetricsError::config("view instrument_name must not be empty"));
            }
            if let Some(boundaries) = &view.histogram_boundaries {
                validate_boundaries(boundaries)?;
            }
        }

        Ok(())
    }

    /// Look up a reader by name
    pub fn reader(&self, name: &str) -> Option<&ReaderConfig> {
        self.readers.iter().find(|reader| reader.name == name)
    }
}

/// Boundaries must be finite and strictly increasing.
pub fn validate_boundaries(boundaries: &[f64]) -> Result<()> {
    if boundaries.is_empty() {
        return Err(MetricsError::invalid_boundaries("at least one boundary is required"));
    }

    if let Some(bad) = boundaries.iter().find(|b| !b.is_finite()) {
        return Err(MetricsError::invalid_boundaries(format!(
            "boundary {} is not finite",
            bad
        )));
    }

    if let Some(pair) = boundaries.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(MetricsError::invalid_boundaries(format!(
            "boundaries must be strictly increasing, found {} before {}",
            pair[0], pair[1]
        )));
    }

    Ok(())
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MetricsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::info!("Loaded metrics configuration from {:?}", path);
        self.from_yaml(&content)
    }

    /// Replace all readers with a single one
    pub fn reader(mut self, name: impl Into<String>, temporality: Temporality) -> Self {
        self.config.readers = vec![ReaderConfig {
            name: name.into(),
            temporality,
        }];
        self
    }

    /// Add another reader
    pub fn add_reader(mut self, name: impl Into<String>, temporality: Temporality) -> Self {
        self.config.readers.push(ReaderConfig {
            name: name.into(),
            temporality,
        });
        self
    }

    /// Add a view
    pub fn view(mut self, view: ViewConfig) -> Self {
        self.config.views.push(view);
        self
    }

    /// Set default histogram boundaries
    pub fn histogram_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.config.aggregation.histogram_boundaries = boundaries;
        self
    }

    /// Set the cardinality limit
    pub fn cardinality_limit(mut self, limit: usize) -> Self {
        self.config.storage.cardinality_limit = limit;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
