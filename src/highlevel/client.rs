//! Engine handle that owns the [`GlobalState`] and serializes batches.
//!
//! For full control, use [`BatchRunner`] and [`GlobalState`] from
//! [`stage`](crate::stage) and [`model`](crate::model) directly.

use crate::config::EngineConfig;
use crate::error::{IncKMeansError, Result};
use crate::kernel::{PartialAggregate, Point};
use crate::model::{Counters, GlobalState, Mode, ModelSnapshot};
use crate::stage::{AssignmentStage, BatchReport, BatchRunner, RoutingKey, StatusLine, UpdateStage};
use parking_lot::{Mutex, MutexGuard};

/// Thread-safe incremental k-means engine.
///
/// Each batch holds the state lock from the moment its mode is read until
/// its last update, so batches apply strictly in the order they acquire
/// the lock and never observe each other's partial effects.
///
/// # Example
///
/// ```rust
/// use inckmeans::config::EngineConfig;
/// use inckmeans::highlevel::IncKMeans;
/// use inckmeans::model::Mode;
///
/// let config = EngineConfig::new(1, vec![vec![0.0], vec![10.0]])
///     .with_training_threshold(2);
/// let engine = IncKMeans::new(config).unwrap();
///
/// engine.process_batch(&["1.0", "9.0"]);
/// assert_eq!(engine.mode(), Mode::Classifying);
///
/// let report = engine.process_batch(&["0.5", "500.0"]);
/// assert_eq!(engine.counters().benign, 1);
/// assert_eq!(engine.counters().outlier, 1);
/// # let _ = report;
/// ```
pub struct IncKMeans {
    config: EngineConfig,
    runner: BatchRunner,
    state: Mutex<GlobalState>,
}

impl IncKMeans {
    /// Build an engine from a config, validating it first.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let state = GlobalState::from_config(&config)?;
        let runner = BatchRunner::from_config(&config);
        Ok(Self {
            config,
            runner,
            state: Mutex::new(state),
        })
    }

    /// Build an engine from a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(EngineConfig::from_json(json)?)
    }

    /// Set how many partitions [`IncKMeans::process_batch`] splits a batch into.
    #[must_use]
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.runner = self.runner.with_partitions(partitions);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Parse, assign, combine and apply one batch of raw records.
    pub fn process_batch<S>(&self, records: &[S]) -> BatchReport
    where
        S: AsRef<str> + Sync,
    {
        let mut state = self.state.lock();
        self.runner.run(&mut state, records)
    }

    /// Open a batch for a host that runs its own assignment and grouping.
    ///
    /// The returned guard holds the state exclusively until it is finished
    /// or dropped.
    pub fn begin_batch(&self) -> Batch<'_> {
        let state = self.state.lock();
        let mode = state.mode();
        Batch {
            state,
            stage: self.runner.stage(),
            mode,
            rejected: 0,
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The mode the next batch will run in.
    pub fn mode(&self) -> Mode {
        self.state.lock().mode()
    }

    pub fn counters(&self) -> Counters {
        self.state.lock().counters()
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        self.state.lock().model().snapshot()
    }

    /// Rendered model followed by the counters.
    pub fn status(&self) -> String {
        let state = self.state.lock();
        let c = state.counters();
        format!(
            "{}\nmode: {}\npoints: {}\nbenign: {}\noutlier: {}\nrejected: {}",
            state.model(),
            state.mode(),
            c.total_points_seen,
            c.benign,
            c.outlier,
            c.rejected_records
        )
    }

    /// A copy of the current state.
    pub fn state(&self) -> GlobalState {
        self.state.lock().clone()
    }

    pub fn into_state(self) -> GlobalState {
        self.state.into_inner()
    }
}

/// Exclusive access to the state for one externally orchestrated batch.
///
/// Assignment takes `&self` and may be called from many threads at once;
/// updates take `&mut self`.
pub struct Batch<'a> {
    state: MutexGuard<'a, GlobalState>,
    stage: &'a AssignmentStage,
    mode: Mode,
    rejected: u64,
}

impl Batch<'_> {
    /// Mode read when the batch was opened.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    /// Parse and route a raw record.
    pub fn assign_record(&self, record: &str) -> Result<(RoutingKey, PartialAggregate)> {
        self.stage.assign_record(self.state.model(), self.mode, record)
    }

    /// Route a parsed point.
    pub fn assign(&self, p: &Point) -> Result<(RoutingKey, PartialAggregate)> {
        let expected = self.state.model().dimensions();
        if p.dimensions() != expected {
            return Err(IncKMeansError::DimensionMismatch {
                expected,
                got: p.dimensions(),
            });
        }
        Ok(self.stage.assign(self.state.model(), self.mode, p))
    }

    /// Apply one combined aggregate.
    pub fn apply(&mut self, key: RoutingKey, aggregate: &PartialAggregate) -> Result<StatusLine> {
        UpdateStage::apply(&mut self.state, key, aggregate)
    }

    /// Apply one textual key/value pair.
    pub fn apply_wire(&mut self, key: &str, value: &str) -> Result<StatusLine> {
        UpdateStage::apply_wire(&mut self.state, key, value)
    }

    /// Count records the host dropped.
    pub fn reject(&mut self, records: u64) {
        self.rejected += records;
    }

    /// Close the batch and return its sequence number.
    pub fn finish(mut self) -> u64 {
        let rejected = self.rejected;
        self.state.record_rejected(rejected);
        self.state.finish_batch()
    }
}
