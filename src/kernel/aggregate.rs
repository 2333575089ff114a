//! Partial aggregates: mergeable per-key summaries of a micro-batch.
//!
//! A partial aggregate summarizes everything one partition saw for one
//! routing key. Partials are combined by componentwise addition, so the
//! combine step is associative and commutative and the surrounding runtime
//! may merge them in any order or grouping:
//!
//! - `combine(a, b) == combine(b, a)`
//! - `combine(combine(a, b), c) == combine(a, combine(b, c))`
//!
//! The identity element is the empty aggregate (zero sums, zero count,
//! zero elapsed time).

use crate::error::{IncKMeansError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::point::Point;

/// A combinable summary of the points routed to one key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartialAggregate {
    /// Training mode: running coordinate sum of the points assigned to a
    /// cluster.
    Centroid {
        sums: Vec<f64>,
        count: u64,
        elapsed_nanos: u64,
    },
    /// Classification mode: a plain tally for a benign/outlier label.
    Tally { count: u64, elapsed_nanos: u64 },
}

impl PartialAggregate {
    /// Identity element for centroid aggregates of the given dimensionality.
    pub fn empty_centroid(dimensions: usize) -> Self {
        Self::Centroid {
            sums: vec![0.0; dimensions],
            count: 0,
            elapsed_nanos: 0,
        }
    }

    /// Identity element for tallies.
    pub fn empty_tally() -> Self {
        Self::Tally {
            count: 0,
            elapsed_nanos: 0,
        }
    }

    /// A single training observation.
    pub fn observation(point: &Point, elapsed_nanos: u64) -> Self {
        Self::Centroid {
            sums: point.data().to_vec(),
            count: 1,
            elapsed_nanos,
        }
    }

    /// A single classified point.
    pub fn single(elapsed_nanos: u64) -> Self {
        Self::Tally {
            count: 1,
            elapsed_nanos,
        }
    }

    /// Number of points summarized.
    pub fn count(&self) -> u64 {
        match self {
            Self::Centroid { count, .. } | Self::Tally { count, .. } => *count,
        }
    }

    /// Total assignment time spent on the summarized points.
    pub fn elapsed_nanos(&self) -> u64 {
        match self {
            Self::Centroid { elapsed_nanos, .. } | Self::Tally { elapsed_nanos, .. } => {
                *elapsed_nanos
            }
        }
    }

    /// Coordinate sums, if this is a centroid aggregate.
    pub fn sums(&self) -> Option<&[f64]> {
        match self {
            Self::Centroid { sums, .. } => Some(sums),
            Self::Tally { .. } => None,
        }
    }

    /// Per-point assignment time. Zero for an empty aggregate.
    pub fn amortized_nanos(&self) -> u64 {
        match self.count() {
            0 => 0,
            n => self.elapsed_nanos() / n,
        }
    }

    /// Merge another aggregate for the same key into this one.
    ///
    /// Fails when the two aggregates have different shapes (centroid vs
    /// tally) or different dimensionality, when the point count would
    /// overflow, or when a combined sum is not finite. `self` is unchanged
    /// on failure.
    pub fn merge(&mut self, other: &PartialAggregate) -> Result<()> {
        match (self, other) {
            (
                Self::Centroid {
                    sums,
                    count,
                    elapsed_nanos,
                },
                Self::Centroid {
                    sums: other_sums,
                    count: other_count,
                    elapsed_nanos: other_elapsed,
                },
            ) => {
                if sums.len() != other_sums.len() {
                    return Err(IncKMeansError::DimensionMismatch {
                        expected: sums.len(),
                        got: other_sums.len(),
                    });
                }
                let merged_count = checked_count(*count, *other_count)?;
                let merged: Vec<f64> = sums.iter().zip(other_sums).map(|(a, b)| a + b).collect();
                if !merged.iter().all(|s| s.is_finite()) {
                    return Err(IncKMeansError::decode("combined sums are not finite"));
                }
                *sums = merged;
                *count = merged_count;
                *elapsed_nanos = elapsed_nanos.saturating_add(*other_elapsed);
                Ok(())
            }
            (
                Self::Tally {
                    count,
                    elapsed_nanos,
                },
                Self::Tally {
                    count: other_count,
                    elapsed_nanos: other_elapsed,
                },
            ) => {
                *count = checked_count(*count, *other_count)?;
                *elapsed_nanos = elapsed_nanos.saturating_add(*other_elapsed);
                Ok(())
            }
            _ => Err(IncKMeansError::decode(
                "cannot combine a centroid aggregate with a tally",
            )),
        }
    }
}

fn checked_count(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| IncKMeansError::decode(format!("point count overflows: {} + {}", a, b)))
}

/// Pure reduction of partial aggregates.
pub struct Aggregator;

impl Aggregator {
    /// Combine two aggregates that share a routing key.
    pub fn combine(a: &PartialAggregate, b: &PartialAggregate) -> Result<PartialAggregate> {
        let mut out = a.clone();
        out.merge(b)?;
        Ok(out)
    }

    /// Fold any number of aggregates. Returns `None` for an empty input.
    pub fn reduce<I>(aggregates: I) -> Result<Option<PartialAggregate>>
    where
        I: IntoIterator<Item = PartialAggregate>,
    {
        let mut iter = aggregates.into_iter();
        let Some(mut acc) = iter.next() else {
            return Ok(None);
        };
        for next in iter {
            acc.merge(&next)?;
        }
        Ok(Some(acc))
    }

    /// Group emissions by key, combining values that share a key.
    ///
    /// The result is ordered by key so downstream processing is
    /// deterministic.
    pub fn group<K, I>(emissions: I) -> Result<BTreeMap<K, PartialAggregate>>
    where
        K: Ord,
        I: IntoIterator<Item = (K, PartialAggregate)>,
    {
        let mut groups = BTreeMap::new();
        for (key, value) in emissions {
            match groups.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => slot.get_mut().merge(&value)?,
            }
        }
        Ok(groups)
    }

    /// Group each partition locally in parallel, then merge the partition
    /// results in partition order.
    ///
    /// The merge order depends only on the partitioning, so a given split
    /// of the same emissions always yields bit-identical sums.
    pub fn reduce_partitions<K>(
        partitions: Vec<Vec<(K, PartialAggregate)>>,
    ) -> Result<BTreeMap<K, PartialAggregate>>
    where
        K: Ord + Send,
    {
        let grouped = partitions
            .into_par_iter()
            .map(Self::group)
            .collect::<Result<Vec<_>>>()?;

        Self::group(grouped.into_iter().flatten())
    }
}
