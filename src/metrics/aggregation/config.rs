//! Per-stream aggregation configuration.

use crate::core::config::{validate_boundaries, AggregationSettings, DEFAULT_HISTOGRAM_BOUNDARIES};
use crate::core::Result;
use serde::{Deserialize, Serialize};

/// Histogram layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramAggregationConfig {
    /// Upper-inclusive bucket boundaries, strictly increasing
    pub boundaries: Vec<f64>,
    /// Track min and max
    pub record_min_max: bool,
}

impl Default for HistogramAggregationConfig {
    fn default() -> Self {
        Self {
            boundaries: DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
            record_min_max: true,
        }
    }
}

impl HistogramAggregationConfig {
    /// Layout with the given boundaries, tracking min/max.
    pub fn with_boundaries(boundaries: Vec<f64>) -> Result<Self> {
        validate_boundaries(&boundaries)?;
        Ok(Self {
            boundaries,
            record_min_max: true,
        })
    }
}

impl From<&AggregationSettings> for HistogramAggregationConfig {
    fn from(settings: &AggregationSettings) -> Self {
        Self {
            boundaries: settings.histogram_boundaries.clone(),
            record_min_max: settings.record_min_max,
        }
    }
}

/// Configuration consumed when an aggregation is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationConfig {
    /// Histogram layout
    Histogram(HistogramAggregationConfig),
}

impl AggregationConfig {
    /// Histogram layout, if this config carries one.
    pub fn histogram(&self) -> Option<&HistogramAggregationConfig> {
        match self {
            Self::Histogram(config) => Some(config),
        }
    }
}

impl From<HistogramAggregationConfig> for AggregationConfig {
    fn from(config: HistogramAggregationConfig) -> Self {
        Self::Histogram(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_boundaries_validates() {
        assert!(HistogramAggregationConfig::with_boundaries(vec![1.0, 2.0]).is_ok());
        assert!(HistogramAggregationConfig::with_boundaries(vec![2.0, 1.0]).is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = AggregationSettings {
            histogram_boundaries: vec![0.1, 1.0],
            record_min_max: false,
        };
        let config = HistogramAggregationConfig::from(&settings);

        assert_eq!(config.boundaries, vec![0.1, 1.0]);
        assert!(!config.record_min_max);
    }
}
