//! Window specifications and the diff strategies that decide which retained
//! rows have aged out when a new chunk arrives.
//!
//! The two strategies are pure functions over the retained chunk queue:
//! - [`diff_row_count`] keeps the most recent `width` rows
//! - [`diff_value_range`] keeps rows whose index is within `width` of the
//!   largest index seen
//!
//! Both return the evicted portions in oldest-to-newest order so that
//! operators can subtract their contributions exactly.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod diff;

pub use diff::*;

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;

/// The policy bounding which historical rows still contribute to the result.
///
/// Immutable for the lifetime of an orchestrator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowSpec {
    /// Expanding accumulation: nothing is ever evicted.
    Unbounded,
    /// The most recent `n` rows.
    RowCount(usize),
    /// Rows whose index lies within `width` units of the maximum index seen.
    ValueRange(i64),
}

impl WindowSpec {
    /// Reject non-positive widths.  Checked once, at construction time.
    pub fn validate(&self) -> Result<()> {
        match *self {
            WindowSpec::RowCount(0) => Err(Error::InvalidWindowWidth(0)),
            WindowSpec::ValueRange(w) if w <= 0 => Err(Error::InvalidWindowWidth(w)),
            _ => Ok(()),
        }
    }

    /// True for the row-count and value-range variants.
    pub fn is_bounded(&self) -> bool {
        !matches!(self, WindowSpec::Unbounded)
    }
}
