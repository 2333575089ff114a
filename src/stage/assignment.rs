//! AssignmentStage: route each point to a key without touching state.
//!
//! - Training: the key is the nearest cluster; the value carries the point
//!   itself as a one-point centroid aggregate.
//! - Classifying: the key is `<benign>` or `<outlier>` by the fit rule; the
//!   value is a one-point tally.
//!
//! Assignment only reads the model, so any number of points can be
//! assigned concurrently.

use crate::config::{EngineConfig, ScaleLaw};
use crate::error::Result;
use crate::kernel::{PartialAggregate, Point, PointCodec, BENIGN_KEY, OUTLIER_KEY};
use crate::model::{ClusterId, ClusterModel, Mode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Grouping key for the combine stage.
///
/// Cluster keys carry the stable cluster id rather than the centroid text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingKey {
    Cluster(ClusterId),
    Benign,
    Outlier,
}

impl RoutingKey {
    /// Textual key as exchanged at a serialization boundary: the cluster's
    /// current centroid signature, or the label.
    pub fn to_wire(&self, model: &ClusterModel) -> Option<String> {
        match self {
            RoutingKey::Cluster(id) => model.get(*id).map(|c| c.signature()),
            RoutingKey::Benign => Some(BENIGN_KEY.to_string()),
            RoutingKey::Outlier => Some(OUTLIER_KEY.to_string()),
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingKey::Cluster(id) => write!(f, "cluster {}", id),
            RoutingKey::Benign => f.write_str(BENIGN_KEY),
            RoutingKey::Outlier => f.write_str(OUTLIER_KEY),
        }
    }
}

/// The benign/outlier decision.
///
/// A point fits when `distance_to_nearest <= (1 - fit_threshold) * scale`,
/// where `scale` comes from the [`ScaleLaw`]. Under
/// [`ScaleLaw::CentroidSpacing`] a single-cluster model has scale zero, so
/// only exact centroid hits fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitRule {
    fit_threshold: f64,
    scale: ScaleLaw,
}

impl FitRule {
    pub fn new(fit_threshold: f64, scale: ScaleLaw) -> Self {
        Self {
            fit_threshold,
            scale,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fit_threshold, config.scale)
    }

    pub fn fit_threshold(&self) -> f64 {
        self.fit_threshold
    }

    pub fn scale(&self) -> ScaleLaw {
        self.scale
    }

    /// Reference scale around a given cluster.
    pub fn reference_scale(&self, model: &ClusterModel, id: ClusterId) -> f64 {
        match self.scale {
            ScaleLaw::Fixed(s) => s,
            ScaleLaw::CentroidSpacing => model.spacing(id).unwrap_or(0.0),
        }
    }

    /// Largest distance from a cluster's centroid that still fits.
    pub fn radius(&self, model: &ClusterModel, id: ClusterId) -> f64 {
        (1.0 - self.fit_threshold) * self.reference_scale(model, id)
    }

    /// Whether `p` fits its nearest cluster.
    pub fn fits(&self, model: &ClusterModel, p: &Point) -> bool {
        let (nearest, distance) = model.nearest(p);
        distance <= self.radius(model, nearest.id())
    }
}

/// Per-point routing.
#[derive(Clone, Copy, Debug)]
pub struct AssignmentStage {
    rule: FitRule,
}

impl AssignmentStage {
    pub fn new(rule: FitRule) -> Self {
        Self { rule }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(FitRule::from_config(config))
    }

    pub fn rule(&self) -> &FitRule {
        &self.rule
    }

    /// Label a point against frozen centroids.
    pub fn classify(&self, model: &ClusterModel, p: &Point) -> RoutingKey {
        if self.rule.fits(model, p) {
            RoutingKey::Benign
        } else {
            RoutingKey::Outlier
        }
    }

    /// Route an already-parsed point.
    ///
    /// # Panics
    /// Panics if `p.dimensions() != model.dimensions()`.
    pub fn assign(
        &self,
        model: &ClusterModel,
        mode: Mode,
        p: &Point,
    ) -> (RoutingKey, PartialAggregate) {
        let started = Instant::now();
        self.route(model, mode, p, started)
    }

    /// Parse a raw record and route it. Parsing time counts towards the
    /// point's elapsed nanos.
    pub fn assign_record(
        &self,
        model: &ClusterModel,
        mode: Mode,
        record: &str,
    ) -> Result<(RoutingKey, PartialAggregate)> {
        let started = Instant::now();
        let p = PointCodec::parse_point_with_dims(record, model.dimensions())?;
        Ok(self.route(model, mode, &p, started))
    }

    fn route(
        &self,
        model: &ClusterModel,
        mode: Mode,
        p: &Point,
        started: Instant,
    ) -> (RoutingKey, PartialAggregate) {
        match mode {
            Mode::Training => {
                let key = RoutingKey::Cluster(model.nearest_cluster(p).id());
                (key, PartialAggregate::observation(p, elapsed_nanos(started)))
            }
            Mode::Classifying => {
                let key = self.classify(model, p);
                (key, PartialAggregate::single(elapsed_nanos(started)))
            }
        }
    }
}

pub(crate) fn elapsed_nanos(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IncKMeansError;

    fn model_1d(seeds: &[f64]) -> ClusterModel {
        let seeds = seeds.iter().map(|&s| Point::from_data(vec![s])).collect();
        ClusterModel::new(1, seeds, 1).unwrap()
    }

    fn stage(fit: f64, scale: ScaleLaw) -> AssignmentStage {
        AssignmentStage::new(FitRule::new(fit, scale))
    }

    #[test]
    fn test_training_routes_to_nearest() {
        let model = model_1d(&[0.0, 10.0]);
        let s = stage(0.7, ScaleLaw::CentroidSpacing);

        let (key, agg) = s.assign(&model, Mode::Training, &Point::from_data(vec![1.0]));
        assert_eq!(key, RoutingKey::Cluster(ClusterId(0)));
        assert_eq!(agg.sums(), Some(&[1.0][..]));
        assert_eq!(agg.count(), 1);

        let (key, _) = s.assign(&model, Mode::Training, &Point::from_data(vec![9.0]));
        assert_eq!(key, RoutingKey::Cluster(ClusterId(1)));
    }

    #[test]
    fn test_classify_exact_hit_is_benign() {
        let model = model_1d(&[0.0, 10.0]);
        let s = stage(0.7, ScaleLaw::CentroidSpacing);
        let (key, agg) = s.assign(&model, Mode::Classifying, &Point::from_data(vec![10.0]));
        assert_eq!(key, RoutingKey::Benign);
        assert_eq!(agg.count(), 1);
        assert!(agg.sums().is_none());
    }

    #[test]
    fn test_classify_far_point_is_outlier() {
        let model = model_1d(&[0.0, 10.0]);
        let s = stage(0.7, ScaleLaw::CentroidSpacing);
        assert_eq!(
            s.classify(&model, &Point::from_data(vec![100.0])),
            RoutingKey::Outlier
        );
    }

    #[test]
    fn test_centroid_spacing_radius() {
        // Spacing is 10, so the fit radius is (1 - 0.7) * 10 = 3.
        let model = model_1d(&[0.0, 10.0]);
        let s = stage(0.7, ScaleLaw::CentroidSpacing);
        assert!((s.rule().radius(&model, ClusterId(0)) - 3.0).abs() < 1e-12);
        assert_eq!(s.classify(&model, &Point::from_data(vec![2.9])), RoutingKey::Benign);
        assert_eq!(s.classify(&model, &Point::from_data(vec![3.1])), RoutingKey::Outlier);
        assert_eq!(s.classify(&model, &Point::from_data(vec![-3.1])), RoutingKey::Outlier);
    }

    #[test]
    fn test_fixed_scale() {
        let model = model_1d(&[0.0]);
        let s = stage(0.5, ScaleLaw::Fixed(4.0));
        assert_eq!(s.classify(&model, &Point::from_data(vec![2.0])), RoutingKey::Benign);
        assert_eq!(s.classify(&model, &Point::from_data(vec![2.5])), RoutingKey::Outlier);
    }

    #[test]
    fn test_single_cluster_spacing_only_exact_hits_fit() {
        let model = model_1d(&[1.0]);
        let s = stage(0.7, ScaleLaw::CentroidSpacing);
        assert_eq!(s.classify(&model, &Point::from_data(vec![1.0])), RoutingKey::Benign);
        assert_eq!(s.classify(&model, &Point::from_data(vec![1.001])), RoutingKey::Outlier);
    }

    #[test]
    fn test_assign_record() {
        let model = model_1d(&[0.0, 10.0]);
        let s = stage(0.7, ScaleLaw::CentroidSpacing);

        let (key, _) = s.assign_record(&model, Mode::Training, " 8.5 ").unwrap();
        assert_eq!(key, RoutingKey::Cluster(ClusterId(1)));

        assert!(matches!(
            s.assign_record(&model, Mode::Training, "1.0,abc"),
            Err(IncKMeansError::Parse { .. })
        ));
        assert!(matches!(
            s.assign_record(&model, Mode::Classifying, "1.0,2.0"),
            Err(IncKMeansError::DimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_assignment_does_not_mutate_model() {
        let model = model_1d(&[0.0, 10.0]);
        let before = model.clone();
        let s = stage(0.7, ScaleLaw::CentroidSpacing);
        for x in [1.0, 5.0, 9.0, 50.0] {
            s.assign(&model, Mode::Training, &Point::from_data(vec![x]));
            s.assign(&model, Mode::Classifying, &Point::from_data(vec![x]));
        }
        assert_eq!(model, before);
    }

    #[test]
    fn test_routing_key_wire_form() {
        let model = model_1d(&[0.0, 10.0]);
        assert_eq!(
            RoutingKey::Cluster(ClusterId(1)).to_wire(&model).as_deref(),
            Some("[10.0]")
        );
        assert_eq!(RoutingKey::Benign.to_wire(&model).as_deref(), Some("<benign>"));
        assert_eq!(RoutingKey::Cluster(ClusterId(5)).to_wire(&model), None);
    }
}
