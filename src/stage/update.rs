//! UpdateStage: apply one fully combined aggregate to the global state.
//!
//! This is the only code that mutates [`GlobalState`]. Callers must run it
//! under exclusive access, once per distinct key per batch.

use crate::error::{IncKMeansError, Result};
use crate::kernel::{PartialAggregate, PointCodec, BENIGN_KEY, OUTLIER_KEY};
use crate::model::GlobalState;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use super::assignment::{elapsed_nanos, RoutingKey};

/// Human-readable outcome of one update, plus the timing figures behind it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusLine {
    pub key: RoutingKey,
    /// Rendered model, label tally (classification only), and elapsed time.
    pub text: String,
    /// Assignment time per point for this key.
    pub amortized_nanos: u64,
    /// Time spent inside this update.
    pub update_nanos: u64,
}

impl StatusLine {
    /// Amortized assignment time plus update time.
    pub fn total_nanos(&self) -> u64 {
        self.amortized_nanos.saturating_add(self.update_nanos)
    }
}

pub struct UpdateStage;

impl UpdateStage {
    /// Apply a combined aggregate for `key`.
    ///
    /// Nothing is mutated when the aggregate's shape does not match the
    /// key, a counter would overflow, or the cluster update is rejected.
    pub fn apply(
        state: &mut GlobalState,
        key: RoutingKey,
        aggregate: &PartialAggregate,
    ) -> Result<StatusLine> {
        let started = Instant::now();
        let count = aggregate.count();
        state.check_points(count)?;

        let tally = match (key, aggregate) {
            (RoutingKey::Cluster(id), PartialAggregate::Centroid { sums, .. }) => {
                state.model_mut().apply_update(id, sums, count)?;
                None
            }
            (RoutingKey::Benign, PartialAggregate::Tally { .. }) => {
                state.record_benign(count)?;
                Some(format!("benign: {}", state.benign_count()))
            }
            (RoutingKey::Outlier, PartialAggregate::Tally { .. }) => {
                state.record_outlier(count)?;
                Some(format!("outlier: {}", state.outlier_count()))
            }
            _ => {
                return Err(IncKMeansError::decode(format!(
                    "aggregate shape does not match key {}",
                    key
                )))
            }
        };
        state.record_points(count)?;

        let update_nanos = elapsed_nanos(started);
        let amortized_nanos = aggregate.amortized_nanos();
        let total = amortized_nanos.saturating_add(update_nanos);

        let text = match tally {
            None => format!(
                "{}\n Elapsed nanoseconds for training: {}",
                state.model(),
                total
            ),
            Some(tally) => format!(
                "{}\n{}\n Elapsed nanoseconds for predicting: {}",
                state.model(),
                tally,
                total
            ),
        };

        debug!(
            key = %key,
            count,
            total_points = state.total_points_seen(),
            amortized_nanos,
            update_nanos,
            "applied combined aggregate"
        );

        Ok(StatusLine {
            key,
            text,
            amortized_nanos,
            update_nanos,
        })
    }

    /// Apply a textual key/value pair as exchanged by a string-only runtime.
    ///
    /// A centroid key must match the current signature of some cluster.
    pub fn apply_wire(state: &mut GlobalState, key: &str, value: &str) -> Result<StatusLine> {
        let key = Self::decode_key(state, key)?;
        let aggregate = PointCodec::decode_aggregate(value)?;
        Self::apply(state, key, &aggregate)
    }

    fn decode_key(state: &GlobalState, key: &str) -> Result<RoutingKey> {
        let key = key.trim();
        if key.eq_ignore_ascii_case(BENIGN_KEY) {
            return Ok(RoutingKey::Benign);
        }
        if key.eq_ignore_ascii_case(OUTLIER_KEY) {
            return Ok(RoutingKey::Outlier);
        }

        let centroid = PointCodec::decode_routing_key(key)?;
        let signature = PointCodec::encode_routing_key(&centroid);
        state
            .model()
            .locate(&signature)
            .map(RoutingKey::Cluster)
            .ok_or_else(|| IncKMeansError::decode(format!("no cluster with centroid {}", key)))
    }
}
