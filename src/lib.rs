//! # inckmeans: Incremental k-means over micro-batched streams
//!
//! inckmeans clusters an unbounded stream of numeric points that arrives in
//! discrete micro-batches. While training, every batch refines a fixed set
//! of centroids; once a configured number of points has been seen, every
//! later point is labelled benign or outlier against the frozen centroids.
//!
//! ## Quick Start
//!
//! ```rust
//! use inckmeans::config::EngineConfig;
//! use inckmeans::highlevel::IncKMeans;
//!
//! let config = EngineConfig::new(2, vec![vec![0.0, 0.0], vec![10.0, 10.0]])
//!     .with_training_threshold(1_000);
//! let engine = IncKMeans::new(config)?;
//!
//! let report = engine.process_batch(&["1.0,1.5", "9.0,9.5", "not,a,point"]);
//! for line in report.status_text() {
//!     println!("{}", line);
//! }
//! assert_eq!(report.rejected_count(), 1);
//! # Ok::<(), inckmeans::IncKMeansError>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Routing key**: the nearest cluster while training, `<benign>` or
//!   `<outlier>` while classifying
//! - **Partial aggregate**: a mergeable (sum, count, elapsed) summary per key
//! - **Update**: one weighted-mean centroid update per key per batch
//! - **Mode**: read once per batch from the global point counter
//!
//! ## Layers
//!
//! - [`kernel`]: points, the textual codec, aggregates
//! - [`model`]: clusters and global state
//! - [`stage`]: assignment, update, and the batch runner
//! - [`highlevel`]: a thread-safe engine handle

pub mod config;
pub mod error;
pub mod highlevel;
pub mod kernel;
pub mod model;
pub mod stage;

// Re-exports for convenience
pub use config::{EngineConfig, ScaleLaw};
pub use error::{IncKMeansError, Result};
pub use highlevel::{Batch, IncKMeans};
pub use kernel::{Aggregator, PartialAggregate, Point, PointCodec};
pub use model::{Cluster, ClusterId, ClusterModel, GlobalState, Mode};
pub use stage::{AssignmentStage, BatchReport, BatchRunner, RoutingKey, StatusLine, UpdateStage};
