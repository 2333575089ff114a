//! High-level convenience API.
//!
//! This layer provides [`IncKMeans`], a thread-safe handle that owns the
//! [`GlobalState`](crate::model::GlobalState) and a
//! [`BatchRunner`](crate::stage::BatchRunner), and [`Batch`], a guard for
//! hosts that run assignment and grouping themselves.
//!
//! For library code that manages its own state, prefer importing from
//! [`stage`](crate::stage) and [`model`](crate::model) directly.

pub mod client;

pub use client::{Batch, IncKMeans};
