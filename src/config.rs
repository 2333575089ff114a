//! Engine configuration.
//!
//! Everything here is fixed at model construction: dimensionality, seed
//! centroids and their prior weight, the training threshold `T`, and the
//! classification fit rule.
//!
//! # Example
//!
//! ```rust
//! use inckmeans::config::{EngineConfig, ScaleLaw};
//!
//! let config = EngineConfig::new(1, vec![vec![0.0], vec![10.0]])
//!     .with_training_threshold(5)
//!     .with_scale(ScaleLaw::Fixed(2.0));
//! assert!(config.validate().is_ok());
//!
//! let parsed = EngineConfig::from_json(
//!     r#"{"dimensions": 2, "seeds": [[0, 0], [5, 5]], "fit_threshold": 0.8}"#,
//! ).unwrap();
//! assert_eq!(parsed.training_threshold, 10_000);
//! ```

use crate::error::{IncKMeansError, Result};
use crate::kernel::MAX_COORDINATE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Point count at which the engine stops training.
pub const DEFAULT_TRAINING_THRESHOLD: u64 = 10_000;
/// Fraction used by the benign/outlier fit rule.
pub const DEFAULT_FIT_THRESHOLD: f64 = 0.70;
/// Pseudo-observations carried by each seed centroid.
pub const DEFAULT_SEED_WEIGHT: u64 = 1;

/// How the reference scale of the fit rule is obtained.
///
/// A point fits when its distance to the nearest centroid is at most
/// `(1 - fit_threshold) * reference_scale`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleLaw {
    /// Distance from the nearest centroid to its closest other centroid.
    #[default]
    CentroidSpacing,
    /// A constant reference scale.
    Fixed(f64),
}

/// Construction-time settings for an engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dimensionality `D` of every point.
    pub dimensions: usize,
    /// Initial centroids, one per cluster, in iteration order.
    pub seeds: Vec<Vec<f64>>,
    /// Training ends once this many points have been applied.
    #[serde(default = "default_training_threshold")]
    pub training_threshold: u64,
    /// Fit fraction in `[0, 1]`.
    #[serde(default = "default_fit_threshold")]
    pub fit_threshold: f64,
    #[serde(default)]
    pub scale: ScaleLaw,
    /// Weight of the seed centroid in every mean update, added to the
    /// cluster count: `(c * (count + w) + sum) / (count + w + n)`.
    ///
    /// The default of `1` departs from the bare running mean
    /// `(c * count + sum) / (count + n)`, which is what `0` gives. With
    /// `0` the first real point replaces the seed outright.
    #[serde(default = "default_seed_weight")]
    pub seed_weight: u64,
}

fn default_training_threshold() -> u64 {
    DEFAULT_TRAINING_THRESHOLD
}

fn default_fit_threshold() -> f64 {
    DEFAULT_FIT_THRESHOLD
}

fn default_seed_weight() -> u64 {
    DEFAULT_SEED_WEIGHT
}

impl EngineConfig {
    /// Create a config with default thresholds.
    ///
    /// Values are NOT validated here; call [`EngineConfig::validate`].
    pub fn new(dimensions: usize, seeds: Vec<Vec<f64>>) -> Self {
        Self {
            dimensions,
            seeds,
            training_threshold: DEFAULT_TRAINING_THRESHOLD,
            fit_threshold: DEFAULT_FIT_THRESHOLD,
            scale: ScaleLaw::default(),
            seed_weight: DEFAULT_SEED_WEIGHT,
        }
    }

    #[must_use]
    pub fn with_training_threshold(mut self, threshold: u64) -> Self {
        self.training_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_fit_threshold(mut self, fit_threshold: f64) -> Self {
        self.fit_threshold = fit_threshold;
        self
    }

    #[must_use]
    pub fn with_seed_weight(mut self, seed_weight: u64) -> Self {
        self.seed_weight = seed_weight;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: ScaleLaw) -> Self {
        self.scale = scale;
        self
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the config, failing on the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(IncKMeansError::InvalidConfig(
                "dimensions must be >= 1".to_string(),
            ));
        }

        if self.seeds.is_empty() {
            return Err(IncKMeansError::InvalidConfig(
                "at least one seed centroid is required".to_string(),
            ));
        }

        for (i, seed) in self.seeds.iter().enumerate() {
            if seed.len() != self.dimensions {
                return Err(IncKMeansError::InvalidConfig(format!(
                    "seed {} has {} coordinates, expected {}",
                    i,
                    seed.len(),
                    self.dimensions
                )));
            }
            if !seed.iter().all(|c| c.is_finite() && c.abs() <= MAX_COORDINATE) {
                return Err(IncKMeansError::InvalidConfig(format!(
                    "seed {} has a non-finite or out-of-range coordinate",
                    i
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.fit_threshold) {
            return Err(IncKMeansError::InvalidConfig(format!(
                "fit_threshold must be in [0, 1], got {}",
                self.fit_threshold
            )));
        }

        match self.scale {
            ScaleLaw::Fixed(s) if !(s.is_finite() && s > 0.0) => {
                Err(IncKMeansError::InvalidConfig(format!(
                    "fixed scale must be > 0 and finite, got {}",
                    s
                )))
            }
            ScaleLaw::CentroidSpacing if self.seeds.len() < 2 => {
                Err(IncKMeansError::InvalidConfig(
                    "centroid_spacing scale needs at least two seeds".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> EngineConfig {
        EngineConfig::new(1, vec![vec![0.0], vec![10.0]])
    }

    #[test]
    fn test_defaults() {
        let config = two_clusters();
        assert_eq!(config.training_threshold, 10_000);
        assert_eq!(config.fit_threshold, 0.70);
        assert_eq!(config.scale, ScaleLaw::CentroidSpacing);
        assert_eq!(config.seed_weight, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = EngineConfig::from_json(
            r#"{
                "dimensions": 2,
                "seeds": [[0.0, 0.0], [1.0, 1.0]],
                "training_threshold": 5,
                "scale": {"fixed": 3.0}
            }"#,
        )
        .unwrap();
        assert_eq!(config.training_threshold, 5);
        assert_eq!(config.scale, ScaleLaw::Fixed(3.0));
        assert_eq!(config.fit_threshold, DEFAULT_FIT_THRESHOLD);
        assert_eq!(config.seed_weight, DEFAULT_SEED_WEIGHT);
    }

    #[test]
    fn test_from_json_unit_scale() {
        let config = EngineConfig::from_json(
            r#"{"dimensions": 1, "seeds": [[0], [1]], "scale": "centroid_spacing"}"#,
        )
        .unwrap();
        assert_eq!(config.scale, ScaleLaw::CentroidSpacing);
    }

    #[test]
    fn test_from_json_syntax_error() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(IncKMeansError::ConfigJson(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/inckmeans.json"),
            Err(IncKMeansError::Io(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "inckmeans_test_config_{}_{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&path, serde_json::to_string(&two_clusters()).unwrap()).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, two_clusters());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_validate_rejects() {
        let invalid = [
            EngineConfig::new(0, vec![vec![]]),
            EngineConfig::new(1, vec![]),
            EngineConfig::new(2, vec![vec![0.0], vec![1.0, 1.0]]),
            EngineConfig::new(1, vec![vec![f64::NAN], vec![1.0]]),
            EngineConfig::new(1, vec![vec![1e300], vec![1.0]]),
            two_clusters().with_fit_threshold(1.5),
            two_clusters().with_fit_threshold(f64::NAN),
            two_clusters().with_scale(ScaleLaw::Fixed(0.0)),
            two_clusters().with_scale(ScaleLaw::Fixed(f64::INFINITY)),
            EngineConfig::new(1, vec![vec![0.0]]),
        ];
        for config in invalid {
            assert!(
                matches!(config.validate(), Err(IncKMeansError::InvalidConfig(_))),
                "expected rejection of {:?}",
                config
            );
        }
    }

    #[test]
    fn test_single_seed_with_fixed_scale() {
        let config = EngineConfig::new(1, vec![vec![0.0]]).with_scale(ScaleLaw::Fixed(1.0));
        assert!(config.validate().is_ok());
    }
}
