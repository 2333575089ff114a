//! Pipeline stages: assignment, update, and the reference batch runner.
//!
//! - [`AssignmentStage`]: read-only, per point, safe to run in parallel.
//! - [`UpdateStage`]: the single writer; one call per combined key.
//! - [`BatchRunner`]: parse → assign → combine → update for one batch.
//!
//! # Example
//!
//! ```rust
//! use inckmeans::config::EngineConfig;
//! use inckmeans::model::{ClusterId, GlobalState};
//! use inckmeans::stage::BatchRunner;
//!
//! let config = EngineConfig::new(1, vec![vec![0.0], vec![10.0]]);
//! let runner = BatchRunner::from_config(&config);
//! let mut state = GlobalState::from_config(&config).unwrap();
//!
//! let report = runner.run(&mut state, &["1.0", "9.0", "oops"]);
//! assert_eq!(report.accepted, 2);
//! assert_eq!(report.rejected_count(), 1);
//! assert_eq!(state.model().get(ClusterId(0)).unwrap().centroid().data(), &[0.5]);
//! ```

pub mod assignment;
pub mod batch;
pub mod update;

pub use assignment::{AssignmentStage, FitRule, RoutingKey};
pub use batch::{BatchReport, BatchRunner, CombinedEntry, RejectedRecord};
pub use update::{StatusLine, UpdateStage};
