//! Kernel layer: points, the wire codec, and mergeable aggregates.
//!
//! The kernel provides the pure building blocks every other layer uses:
//! - Dense points and Euclidean distance ([`Point`])
//! - Record parsing and the textual key/value format ([`PointCodec`])
//! - Associative, commutative partial aggregates ([`PartialAggregate`], [`Aggregator`])
//!
//! This layer has no dependencies on [`model`](crate::model),
//! [`stage`](crate::stage), or [`highlevel`](crate::highlevel).
//!
//! # Example
//!
//! ```rust
//! use inckmeans::kernel::{Aggregator, PartialAggregate, PointCodec};
//!
//! let p = PointCodec::parse_point("1.0,2.0").unwrap();
//! let a = PartialAggregate::observation(&p, 0);
//! let b = PartialAggregate::observation(&p, 0);
//! let both = Aggregator::combine(&a, &b).unwrap();
//! assert_eq!(PointCodec::encode_aggregate(&both), "2.0,4.0;2:0");
//! ```

pub mod aggregate;
pub mod codec;
pub mod point;

pub use aggregate::{Aggregator, PartialAggregate};
pub use codec::{PointCodec, BENIGN_KEY, MAX_COORDINATE, OUTLIER_KEY};
pub use point::Point;
