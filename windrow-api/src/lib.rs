//! # Windrow API
//!
//! User-facing aggregator handles over the windrow engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use windrow_api::aggregator::StreamAggregator;
//! use windrow_api::windrow_core::aggregate::Sum;
//! use windrow_api::windrow_core::types::Chunk;
//! use windrow_api::windrow_core::window::WindowSpec;
//!
//! let mut rolling = StreamAggregator::new(Sum, WindowSpec::RowCount(2)).unwrap();
//! let value = rolling.step(&Chunk::of("x", vec![1.0, 2.0]).unwrap()).unwrap();
//! assert_eq!(value.scalar(), Some(3.0));
//! ```
//!
//! - [`aggregator`] — [`StreamAggregator`](aggregator::StreamAggregator) and
//!   [`GroupedStreamAggregator`](aggregator::GroupedStreamAggregator): owned
//!   handles that carry accumulator state across steps.

pub mod aggregator;

pub use windrow_core;
