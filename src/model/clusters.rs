//! ClusterModel: a fixed set of clusters refined by incremental mean updates.
//!
//! Each cluster keeps a centroid and the number of points applied to it.
//! Clusters are identified by their position in the model ([`ClusterId`]),
//! which never changes while the centroid moves.
//!
//! # Update rule
//!
//! A seed centroid counts as `seed_weight` pseudo-observations. With
//! `w = count + seed_weight`, applying a delta of `n` points with
//! coordinate sum `s` gives:
//!
//! ```text
//! centroid' = (centroid * w + s) / (w + n)
//! count'    = count + n
//! ```
//!
//! Because this is a plain weighted mean, applying one combined delta is
//! equivalent to applying its points one at a time.

use crate::config::EngineConfig;
use crate::error::{IncKMeansError, Result};
use crate::kernel::{Point, PointCodec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a cluster: its index in the model's iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub usize);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A centroid and the number of points it has absorbed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    id: ClusterId,
    centroid: Point,
    count: u64,
}

impl Cluster {
    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn centroid(&self) -> &Point {
        &self.centroid
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Textual centroid signature, as produced by
    /// [`PointCodec::encode_routing_key`].
    pub fn signature(&self) -> String {
        PointCodec::encode_routing_key(&self.centroid)
    }
}

/// Serializable view of a model for structured status output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub dimensions: usize,
    pub seed_weight: u64,
    pub clusters: Vec<Cluster>,
}

/// The set of clusters being trained.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterModel {
    dimensions: usize,
    seed_weight: u64,
    clusters: Vec<Cluster>,
}

impl ClusterModel {
    /// Create a model from seed centroids, all starting at count zero.
    pub fn new(dimensions: usize, seeds: Vec<Point>, seed_weight: u64) -> Result<Self> {
        if seeds.is_empty() {
            return Err(IncKMeansError::InvalidConfig(
                "a model needs at least one cluster".to_string(),
            ));
        }

        let clusters = seeds
            .into_iter()
            .enumerate()
            .map(|(i, centroid)| {
                if centroid.dimensions() != dimensions {
                    return Err(IncKMeansError::DimensionMismatch {
                        expected: dimensions,
                        got: centroid.dimensions(),
                    });
                }
                Ok(Cluster {
                    id: ClusterId(i),
                    centroid,
                    count: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            dimensions,
            seed_weight,
            clusters,
        })
    }

    /// Create a model from a validated config.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let seeds = config.seeds.iter().cloned().map(Point::from_data).collect();
        Self::new(config.dimensions, seeds, config.seed_weight)
    }

    // --- Accessors ---

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn seed_weight(&self) -> u64 {
        self.seed_weight
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0)
    }

    /// Sum of all cluster counts.
    pub fn total_count(&self) -> u64 {
        self.clusters.iter().map(|c| c.count).sum()
    }

    // --- Lookup ---

    /// Nearest cluster and its Euclidean distance to `p`.
    ///
    /// Ties go to the cluster that comes first in iteration order.
    ///
    /// # Panics
    /// Panics if `p.dimensions() != self.dimensions()`.
    pub fn nearest(&self, p: &Point) -> (&Cluster, f64) {
        let mut best = &self.clusters[0];
        let mut best_sq = best.centroid.squared_distance(p);

        for cluster in &self.clusters[1..] {
            let d = cluster.centroid.squared_distance(p);
            if d < best_sq {
                best = cluster;
                best_sq = d;
            }
        }

        (best, best_sq.sqrt())
    }

    /// The cluster whose centroid is closest to `p`.
    pub fn nearest_cluster(&self, p: &Point) -> &Cluster {
        self.nearest(p).0
    }

    /// The minimal Euclidean distance from `p` to any centroid.
    pub fn distance_to_nearest(&self, p: &Point) -> f64 {
        self.nearest(p).1
    }

    /// Distance from a cluster's centroid to the closest other centroid.
    ///
    /// Returns `None` for an unknown id or a single-cluster model.
    pub fn spacing(&self, id: ClusterId) -> Option<f64> {
        let cluster = self.get(id)?;
        self.clusters
            .iter()
            .filter(|other| other.id != id)
            .map(|other| other.centroid.distance(&cluster.centroid))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Find the cluster whose current centroid signature equals `signature`.
    pub fn locate(&self, signature: &str) -> Option<ClusterId> {
        self.clusters
            .iter()
            .find(|c| c.signature() == signature)
            .map(|c| c.id)
    }

    // --- Mutation ---

    /// Fold `delta_count` points with coordinate sum `delta_sums` into a
    /// cluster's centroid. A zero count leaves the cluster unchanged.
    ///
    /// Fails, leaving the cluster untouched, when the count would overflow
    /// or a coordinate of the new centroid is not finite.
    pub fn apply_update(
        &mut self,
        id: ClusterId,
        delta_sums: &[f64],
        delta_count: u64,
    ) -> Result<()> {
        let dimensions = self.dimensions;
        let seed_weight = self.seed_weight;
        let cluster = self
            .clusters
            .get_mut(id.0)
            .ok_or(IncKMeansError::UnknownCluster(id.0))?;

        if delta_sums.len() != dimensions {
            return Err(IncKMeansError::DimensionMismatch {
                expected: dimensions,
                got: delta_sums.len(),
            });
        }

        if delta_count == 0 {
            return Ok(());
        }

        let count = cluster.count.checked_add(delta_count).ok_or_else(|| {
            IncKMeansError::decode(format!("cluster {} count overflows", id))
        })?;
        let weight = cluster.count as f64 + seed_weight as f64;
        let total = weight + delta_count as f64;
        let coords: Vec<f64> = cluster
            .centroid
            .data()
            .iter()
            .zip(delta_sums)
            .map(|(&c, &s)| (c * weight + s) / total)
            .collect();
        if !coords.iter().all(|c| c.is_finite()) {
            return Err(IncKMeansError::decode(format!(
                "update of cluster {} gives a non-finite centroid",
                id
            )));
        }

        cluster.centroid = Point::from_data(coords);
        cluster.count = count;
        Ok(())
    }

    /// Export the model for structured reporting.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            dimensions: self.dimensions,
            seed_weight: self.seed_weight,
            clusters: self.clusters.clone(),
        }
    }
}

impl fmt::Display for ClusterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cluster) in self.clusters.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "cluster {} {} count={}",
                cluster.id,
                cluster.signature(),
                cluster.count
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn model_1d(seeds: &[f64], seed_weight: u64) -> ClusterModel {
        let seeds = seeds.iter().map(|&s| Point::from_data(vec![s])).collect();
        ClusterModel::new(1, seeds, seed_weight).unwrap()
    }

    fn p(coords: &[f64]) -> Point {
        Point::from_data(coords.to_vec())
    }

    #[test]
    fn test_new_rejects_bad_seeds() {
        assert!(ClusterModel::new(1, vec![], 1).is_err());
        assert!(matches!(
            ClusterModel::new(2, vec![p(&[0.0])], 1),
            Err(IncKMeansError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig::new(2, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        let model = ClusterModel::from_config(&config).unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!(model.dimensions(), 2);
        assert_eq!(model.total_count(), 0);

        let bad = EngineConfig::new(2, vec![vec![0.0]]);
        assert!(ClusterModel::from_config(&bad).is_err());
    }

    #[test]
    fn test_nearest_cluster() {
        let model = model_1d(&[0.0, 10.0], 1);
        assert_eq!(model.nearest_cluster(&p(&[1.0])).id(), ClusterId(0));
        assert_eq!(model.nearest_cluster(&p(&[9.0])).id(), ClusterId(1));
        assert!((model.distance_to_nearest(&p(&[7.0])) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_tie_goes_to_first() {
        let model = model_1d(&[0.0, 10.0, 10.0], 1);
        assert_eq!(model.nearest_cluster(&p(&[5.0])).id(), ClusterId(0));
        assert_eq!(model.nearest_cluster(&p(&[12.0])).id(), ClusterId(1));
    }

    #[test]
    fn test_nearest_is_deterministic() {
        let seeds = (0..8).map(|i| p(&[i as f64, (i * i) as f64])).collect();
        let model = ClusterModel::new(2, seeds, 1).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let probe = p(&[rng.gen_range(-5.0..15.0), rng.gen_range(-5.0..60.0)]);
            let first = model.nearest_cluster(&probe).id();
            for _ in 0..3 {
                assert_eq!(model.nearest_cluster(&probe).id(), first);
            }
        }
    }

    #[test]
    fn test_apply_update_with_seed_weight() {
        let mut model = model_1d(&[0.0, 10.0], 1);
        model.apply_update(ClusterId(0), &[1.0], 1).unwrap();
        model.apply_update(ClusterId(1), &[9.0], 1).unwrap();

        assert_eq!(model.get(ClusterId(0)).unwrap().centroid().data(), &[0.5]);
        assert_eq!(model.get(ClusterId(1)).unwrap().centroid().data(), &[9.5]);
        assert_eq!(model.get(ClusterId(0)).unwrap().count(), 1);
        assert_eq!(model.get(ClusterId(1)).unwrap().count(), 1);
    }

    #[test]
    fn test_apply_update_weighted_mean() {
        let mut model = model_1d(&[0.0], 0);
        // First delta replaces the seed outright: centroid 1.0, count 4.
        model.apply_update(ClusterId(0), &[4.0], 4).unwrap();
        assert_eq!(model.get(ClusterId(0)).unwrap().centroid().data(), &[1.0]);

        model.apply_update(ClusterId(0), &[5.0], 3).unwrap();
        let cluster = model.get(ClusterId(0)).unwrap();
        assert!((cluster.centroid()[0] - 9.0 / 7.0).abs() < 1e-12);
        assert_eq!(cluster.count(), 7);
    }

    #[test]
    fn test_apply_update_rejects_overflow() {
        let mut model = model_1d(&[0.0, 10.0], 1);
        model.apply_update(ClusterId(0), &[1.5e308], 1).unwrap();
        let before = model.clone();

        // centroid * weight + sum leaves the f64 range.
        assert!(matches!(
            model.apply_update(ClusterId(0), &[1.5e308], 1),
            Err(IncKMeansError::Decode(_))
        ));
        assert!(model.apply_update(ClusterId(1), &[0.0], u64::MAX).is_ok());
        assert!(model.apply_update(ClusterId(1), &[0.0], 1).is_err());

        assert_eq!(model.get(ClusterId(0)), before.get(ClusterId(0)));
        assert_eq!(model.get(ClusterId(1)).unwrap().count(), u64::MAX);
    }

    #[test]
    fn test_zero_delta_is_noop() {
        for seed_weight in [0, 1, 5] {
            let mut model = model_1d(&[3.0, 8.0], seed_weight);
            let before = model.clone();
            model.apply_update(ClusterId(1), &[0.0], 0).unwrap();
            assert_eq!(model, before);
        }
    }

    #[test]
    fn test_combined_update_matches_sequential() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let points: Vec<Point> = (0..25)
            .map(|_| p(&[rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0)]))
            .collect();

        let seeds = vec![p(&[0.5, -0.5])];
        let mut sequential = ClusterModel::new(2, seeds.clone(), 1).unwrap();
        let mut combined = ClusterModel::new(2, seeds, 1).unwrap();

        let mut sums = Point::zeros(2);
        for point in &points {
            sequential.apply_update(ClusterId(0), point.data(), 1).unwrap();
            sums.accumulate(point.data());
        }
        combined
            .apply_update(ClusterId(0), sums.data(), points.len() as u64)
            .unwrap();

        let a = sequential.get(ClusterId(0)).unwrap();
        let b = combined.get(ClusterId(0)).unwrap();
        assert_eq!(a.count(), b.count());
        for d in 0..2 {
            assert!(
                (a.centroid()[d] - b.centroid()[d]).abs() < 1e-9,
                "sequential {} vs combined {}",
                a.centroid()[d],
                b.centroid()[d]
            );
        }
    }

    #[test]
    fn test_apply_update_errors() {
        let mut model = model_1d(&[0.0], 1);
        assert!(matches!(
            model.apply_update(ClusterId(3), &[1.0], 1),
            Err(IncKMeansError::UnknownCluster(3))
        ));
        assert!(matches!(
            model.apply_update(ClusterId(0), &[1.0, 2.0], 1),
            Err(IncKMeansError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_identity_survives_updates() {
        let mut model = model_1d(&[0.0, 10.0], 1);
        let before = model.get(ClusterId(0)).unwrap().signature();
        assert_eq!(model.locate(&before), Some(ClusterId(0)));

        model.apply_update(ClusterId(0), &[2.0], 1).unwrap();
        let after = model.get(ClusterId(0)).unwrap().signature();

        assert_ne!(before, after);
        assert_eq!(model.locate(&before), None);
        assert_eq!(model.locate(&after), Some(ClusterId(0)));
        assert_eq!(model.get(ClusterId(0)).unwrap().id(), ClusterId(0));
    }

    #[test]
    fn test_spacing() {
        let model = model_1d(&[0.0, 10.0, 4.0], 1);
        assert_eq!(model.spacing(ClusterId(0)), Some(4.0));
        assert_eq!(model.spacing(ClusterId(1)), Some(6.0));
        assert_eq!(model.spacing(ClusterId(9)), None);
        assert_eq!(model_1d(&[1.0], 1).spacing(ClusterId(0)), None);
    }

    #[test]
    fn test_display_and_snapshot() {
        let mut model = model_1d(&[0.0, 10.0], 1);
        model.apply_update(ClusterId(1), &[9.0], 1).unwrap();

        assert_eq!(
            model.to_string(),
            "cluster #0 [0.0] count=0\ncluster #1 [9.5] count=1"
        );

        let json = serde_json::to_string(&model.snapshot()).unwrap();
        let snapshot: ModelSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, model.snapshot());
        assert_eq!(snapshot.clusters[1].count(), 1);
    }
}
