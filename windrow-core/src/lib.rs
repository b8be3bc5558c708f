//! # Windrow Core
//!
//! Incremental windowed aggregation: given chunks arriving over time, keep
//! running aggregate results without ever rescanning history.
//!
//! This crate provides the engine proper:
//!
//! - [`types`] — Core data types: [`Chunk`](types::Chunk),
//!   [`AggValue`](types::AggValue), [`Series`](types::Series),
//!   [`GroupTable`](types::GroupTable).
//! - [`aggregate`] — Decomposable operators: [`Sum`](aggregate::Sum),
//!   [`Count`](aggregate::Count), [`Mean`](aggregate::Mean),
//!   [`Var`](aggregate::Var), [`Full`](aggregate::Full) and their grouped
//!   counterparts.
//! - [`window`] — [`WindowSpec`](window::WindowSpec) and the row-count /
//!   value-range diff strategies.
//! - [`accumulate`] — The orchestrators: [`Expanding`](accumulate::Expanding),
//!   [`Windowed`](accumulate::Windowed), [`Grouped`](accumulate::Grouped).
//! - [`grouper`] — Key-sequence resolution for grouped operators.
//!
//! The engine has no internal concurrency: each orchestrator is a pure,
//! synchronous state-transition function, and the surrounding scheduler must
//! deliver chunks to one instance serialized.  Independent partitions get
//! independent instances, shared-nothing.

pub mod accumulate;
pub mod aggregate;
pub mod error;
pub mod grouper;
pub mod types;
pub mod window;

pub use error::{Error, Result};
