//! GlobalState: the model plus the counters that drive the mode switch.
//!
//! The state is an explicit value threaded through each batch. Only the
//! update stage mutates it, and the mode is derived from
//! `total_points_seen` rather than stored.

use crate::config::EngineConfig;
use crate::error::{IncKMeansError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::clusters::ClusterModel;

/// Processing phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Incoming points refine centroids.
    Training,
    /// Incoming points are labelled benign/outlier against frozen centroids.
    Classifying,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Training => f.write_str("training"),
            Mode::Classifying => f.write_str("classifying"),
        }
    }
}

/// Point-level counters, copied into every batch report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total_points_seen: u64,
    pub benign: u64,
    pub outlier: u64,
    pub rejected_records: u64,
    pub batches_applied: u64,
}

/// Everything a batch reads at its start and the update stage mutates.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalState {
    model: ClusterModel,
    training_threshold: u64,
    counters: Counters,
}

impl GlobalState {
    pub fn new(model: ClusterModel, training_threshold: u64) -> Self {
        Self {
            model,
            training_threshold,
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(
            ClusterModel::from_config(config)?,
            config.training_threshold,
        ))
    }

    /// Training while fewer than `training_threshold` points have been
    /// applied. Monotone, since the counter never decreases.
    pub fn mode(&self) -> Mode {
        if self.counters.total_points_seen < self.training_threshold {
            Mode::Training
        } else {
            Mode::Classifying
        }
    }

    pub fn model(&self) -> &ClusterModel {
        &self.model
    }

    pub(crate) fn model_mut(&mut self) -> &mut ClusterModel {
        &mut self.model
    }

    pub fn training_threshold(&self) -> u64 {
        self.training_threshold
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn total_points_seen(&self) -> u64 {
        self.counters.total_points_seen
    }

    pub fn benign_count(&self) -> u64 {
        self.counters.benign
    }

    pub fn outlier_count(&self) -> u64 {
        self.counters.outlier
    }

    pub fn rejected_records(&self) -> u64 {
        self.counters.rejected_records
    }

    // --- Counter bookkeeping (update stage only) ---

    /// Fails without touching the counters when adding `n` points would
    /// overflow `total_points_seen`. Label tallies never exceed the total,
    /// so a passing check covers them as well.
    pub(crate) fn check_points(&self, n: u64) -> Result<()> {
        self.counters
            .total_points_seen
            .checked_add(n)
            .map(|_| ())
            .ok_or_else(|| {
                IncKMeansError::decode(format!(
                    "{} points would overflow the total of {}",
                    n, self.counters.total_points_seen
                ))
            })
    }

    pub(crate) fn record_points(&mut self, n: u64) -> Result<()> {
        self.check_points(n)?;
        self.counters.total_points_seen += n;
        Ok(())
    }

    pub(crate) fn record_benign(&mut self, n: u64) -> Result<()> {
        self.counters.benign = checked_tally(self.counters.benign, n)?;
        Ok(())
    }

    pub(crate) fn record_outlier(&mut self, n: u64) -> Result<()> {
        self.counters.outlier = checked_tally(self.counters.outlier, n)?;
        Ok(())
    }

    pub(crate) fn record_rejected(&mut self, n: u64) {
        self.counters.rejected_records = self.counters.rejected_records.saturating_add(n);
    }

    /// Close a batch and return its sequence number (starting at 1).
    pub(crate) fn finish_batch(&mut self) -> u64 {
        self.counters.batches_applied += 1;
        self.counters.batches_applied
    }
}

fn checked_tally(tally: u64, n: u64) -> Result<u64> {
    tally
        .checked_add(n)
        .ok_or_else(|| IncKMeansError::decode(format!("label tally overflows: {} + {}", tally, n)))
}
