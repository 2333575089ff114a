//! Model layer: the clusters under training and the global counters.
//!
//! - [`ClusterModel`]: seed-initialized clusters with nearest-centroid
//!   lookup and the incremental mean update.
//! - [`GlobalState`]: the model plus `total_points_seen`, the
//!   benign/outlier tallies, and the derived [`Mode`].
//!
//! ```rust
//! use inckmeans::config::EngineConfig;
//! use inckmeans::kernel::Point;
//! use inckmeans::model::{ClusterId, GlobalState, Mode};
//!
//! let config = EngineConfig::new(1, vec![vec![0.0], vec![10.0]]);
//! let state = GlobalState::from_config(&config).unwrap();
//! assert_eq!(state.mode(), Mode::Training);
//!
//! let nearest = state.model().nearest_cluster(&Point::from_data(vec![7.0]));
//! assert_eq!(nearest.id(), ClusterId(1));
//! ```

pub mod clusters;
pub mod state;

pub use clusters::{Cluster, ClusterId, ClusterModel, ModelSnapshot};
pub use state::{Counters, GlobalState, Mode};
