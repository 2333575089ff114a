//! Reference micro-batch runner.
//!
//! Runs one batch end to end against a [`GlobalState`]:
//!
//! 1. Read the mode once.
//! 2. Parse and assign every record in parallel, split into partitions.
//! 3. Group each partition by routing key, then merge partitions.
//! 4. Apply each combined aggregate sequentially.
//!
//! Bad records are dropped and reported; they never abort the batch.

use crate::config::EngineConfig;
use crate::error::IncKMeansError;
use crate::kernel::{Aggregator, PartialAggregate};
use crate::model::{Counters, GlobalState, Mode};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use super::assignment::{elapsed_nanos, AssignmentStage, RoutingKey};
use super::update::{StatusLine, UpdateStage};

/// A record (or a combined key) that was dropped.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Position of the record in the batch, when a single record failed.
    pub index: Option<usize>,
    /// Routing key, when the failure happened after assignment.
    pub key: Option<RoutingKey>,
    /// Number of points lost.
    pub count: u64,
    pub error: String,
}

/// One entry of the reduced stream: everything a key received this batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CombinedEntry {
    pub key: RoutingKey,
    /// The key as a string-only runtime would have carried it.
    pub wire_key: Option<String>,
    pub aggregate: PartialAggregate,
}

/// Outcome of one batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    /// Batch sequence number, starting at 1.
    pub sequence: u64,
    /// Mode read at batch start and applied to every point.
    pub mode: Mode,
    /// Points applied to the state.
    pub accepted: u64,
    pub combined: Vec<CombinedEntry>,
    pub status: Vec<StatusLine>,
    pub rejected: Vec<RejectedRecord>,
    /// Counters after the batch.
    pub counters: Counters,
    pub elapsed_nanos: u64,
}

impl BatchReport {
    /// Points dropped in this batch.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.iter().map(|r| r.count).sum()
    }

    /// Status texts in key order.
    pub fn status_text(&self) -> impl Iterator<Item = &str> {
        self.status.iter().map(|s| s.text.as_str())
    }
}

type Emission = (usize, RoutingKey, PartialAggregate);

#[derive(Default)]
struct PartitionOutput {
    emissions: Vec<Emission>,
    rejected: Vec<RejectedRecord>,
}

/// Runs batches with a fixed assignment stage and partition count.
#[derive(Clone, Debug)]
pub struct BatchRunner {
    stage: AssignmentStage,
    partitions: usize,
}

impl BatchRunner {
    pub fn new(stage: AssignmentStage) -> Self {
        Self {
            stage,
            partitions: rayon::current_num_threads().max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(AssignmentStage::from_config(config))
    }

    /// Number of partitions each batch is split into (minimum 1).
    #[must_use]
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn stage(&self) -> &AssignmentStage {
        &self.stage
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Process one batch of raw records against `state`.
    pub fn run<S>(&self, state: &mut GlobalState, records: &[S]) -> BatchReport
    where
        S: AsRef<str> + Sync,
    {
        let started = Instant::now();
        let mode = state.mode();

        let outputs = self.assign_partitions(state, mode, records);

        let mut rejected: Vec<RejectedRecord> = Vec::new();
        let mut partitions: Vec<Vec<Emission>> = Vec::with_capacity(outputs.len());
        for output in outputs {
            rejected.extend(output.rejected);
            partitions.push(output.emissions);
        }

        let groups = Self::combine(partitions, &mut rejected);

        let combined: Vec<CombinedEntry> = groups
            .iter()
            .map(|(key, aggregate)| CombinedEntry {
                key: *key,
                wire_key: key.to_wire(state.model()),
                aggregate: aggregate.clone(),
            })
            .collect();

        let mut status = Vec::with_capacity(groups.len());
        let mut accepted = 0;
        for (key, aggregate) in &groups {
            match UpdateStage::apply(state, *key, aggregate) {
                Ok(line) => {
                    accepted += aggregate.count();
                    status.push(line);
                }
                Err(err) => {
                    warn!(key = %key, count = aggregate.count(), error = %err, "dropping combined aggregate");
                    rejected.push(RejectedRecord {
                        index: None,
                        key: Some(*key),
                        count: aggregate.count(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let dropped: u64 = rejected.iter().map(|r| r.count).sum();
        state.record_rejected(dropped);
        let sequence = state.finish_batch();

        if mode == Mode::Training && state.mode() == Mode::Classifying {
            warn!(
                batch = sequence,
                total_points = state.total_points_seen(),
                threshold = state.training_threshold(),
                "training complete, classifying from next batch"
            );
        }

        info!(
            batch = sequence,
            mode = %mode,
            records = records.len(),
            accepted,
            rejected = dropped,
            keys = status.len(),
            total_points = state.total_points_seen(),
            "batch applied"
        );

        BatchReport {
            sequence,
            mode,
            accepted,
            combined,
            status,
            rejected,
            counters: state.counters(),
            elapsed_nanos: elapsed_nanos(started),
        }
    }

    fn assign_partitions<S>(
        &self,
        state: &GlobalState,
        mode: Mode,
        records: &[S],
    ) -> Vec<PartitionOutput>
    where
        S: AsRef<str> + Sync,
    {
        if records.is_empty() {
            return Vec::new();
        }

        let model = state.model();
        let chunk = records.len().div_ceil(self.partitions);

        records
            .par_chunks(chunk)
            .enumerate()
            .map(|(part, slice)| {
                let base = part * chunk;
                let mut output = PartitionOutput::default();
                for (offset, record) in slice.iter().enumerate() {
                    let index = base + offset;
                    match self.stage.assign_record(model, mode, record.as_ref()) {
                        Ok((key, aggregate)) => output.emissions.push((index, key, aggregate)),
                        Err(err) => {
                            warn!(index, error = %err, "dropping record");
                            output.rejected.push(RejectedRecord {
                                index: Some(index),
                                key: None,
                                count: 1,
                                error: err.to_string(),
                            });
                        }
                    }
                }
                output
            })
            .collect()
    }

    /// Reduce all partitions by key. If the parallel reduction fails, fall
    /// back to a sequential pass that drops only the conflicting emissions.
    fn combine(
        partitions: Vec<Vec<Emission>>,
        rejected: &mut Vec<RejectedRecord>,
    ) -> BTreeMap<RoutingKey, PartialAggregate> {
        let keyed: Vec<Vec<(RoutingKey, PartialAggregate)>> = partitions
            .iter()
            .map(|p| p.iter().map(|(_, k, a)| (*k, a.clone())).collect())
            .collect();

        match Aggregator::reduce_partitions(keyed) {
            Ok(groups) => groups,
            Err(err) => {
                warn!(error = %err, "parallel combine failed, regrouping sequentially");
                let mut groups = BTreeMap::new();
                for (index, key, aggregate) in partitions.into_iter().flatten() {
                    if let Err(err) = merge_into(&mut groups, key, &aggregate) {
                        rejected.push(RejectedRecord {
                            index: Some(index),
                            key: Some(key),
                            count: aggregate.count(),
                            error: err.to_string(),
                        });
                    }
                }
                groups
            }
        }
    }
}

fn merge_into(
    groups: &mut BTreeMap<RoutingKey, PartialAggregate>,
    key: RoutingKey,
    aggregate: &PartialAggregate,
) -> std::result::Result<(), IncKMeansError> {
    match groups.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(aggregate.clone());
            Ok(())
        }
        Entry::Occupied(mut slot) => slot.get_mut().merge(aggregate),
    }
}

// =============================================================================
// Tests
// =============================================================================
