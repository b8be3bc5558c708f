//! Decomposable aggregation operators.
//!
//! An operator exposes the four-operation capability set the orchestrators
//! drive: `initial` builds a zero-valued accumulator shaped like an empty
//! slice of the chunk's schema, `on_new` folds an arriving chunk in,
//! `on_old` exactly subtracts a chunk that has left the window, and
//! `current` reads the result back out of the accumulator alone.
//!
//! The accumulator is a sufficient statistic: for every variant the current
//! result is recomputable from the state without access to retained rows.
//! [`Full`] is the one exception in mechanism (it retains raw rows and
//! re-slices instead of subtracting) but not in contract.
//!
//! Scalar variants: [`Sum`], [`Count`], [`Mean`], [`Var`], [`Full`].
//! Grouped counterparts live in [`GroupedAggregation`] implementations:
//! [`GroupedSum`], [`GroupedCount`], [`GroupedMean`], [`GroupedVar`].

use crate::error::{Error, Result};
use crate::types::{AggValue, Chunk, GroupKey, Series};

mod grouped;
mod scalar;

pub use grouped::*;
pub use scalar::*;

#[cfg(test)]
#[path = "tests/aggregate_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/grouped_tests.rs"]
mod grouped_tests;

// ── Aggregation ───────────────────────────────────────────────────────────────

/// A decomposable aggregate: a chunk's contribution can be added and later
/// exactly subtracted without rescanning retained history.
///
/// Adding then removing the same chunk restores the prior state, exactly for
/// [`Sum`], [`Count`] and [`Full`], and within floating-point cancellation
/// for [`Mean`] and [`Var`].
pub trait Aggregation {
    /// Sufficient statistic carried between steps.
    type State;

    /// A zero-valued accumulator whose shape matches an empty slice of
    /// `chunk`'s schema, so the first `on_new` needs no special casing.
    fn initial(&self, chunk: &Chunk) -> Result<Self::State>;

    /// Fold a newly arrived chunk into the accumulator.
    fn on_new(&self, state: Self::State, chunk: &Chunk) -> Result<(Self::State, AggValue)>;

    /// Subtract a chunk whose rows have exited the window.
    fn on_old(&self, state: Self::State, chunk: &Chunk) -> Result<(Self::State, AggValue)>;

    /// The current result, recomputed from the accumulator alone.
    fn current(&self, state: &Self::State) -> AggValue;

    /// Single-shot evaluation that carries no state.
    fn stateless(&self, chunk: &Chunk) -> Result<AggValue> {
        let state = self.initial(chunk)?;
        Ok(self.on_new(state, chunk)?.1)
    }

    /// Generic combinator: retire `old` first (if any), fold `new` next (if
    /// any); the last call's result wins.  When neither is present the
    /// result falls back to [`current`](Self::current).
    fn update(
        &self,
        state: Self::State,
        new: Option<&Chunk>,
        old: Option<&Chunk>,
    ) -> Result<(Self::State, AggValue)> {
        let mut state = state;
        let mut out = None;
        if let Some(old) = old {
            let (next, value) = self.on_old(state, old)?;
            state = next;
            out = Some(value);
        }
        if let Some(new) = new {
            let (next, value) = self.on_new(state, new)?;
            state = next;
            out = Some(value);
        }
        let value = out.unwrap_or_else(|| self.current(&state));
        Ok((state, value))
    }
}

/// Step-time shape check shared by every operator.
pub(crate) fn check_columns(expected: &[String], chunk: &Chunk) -> Result<()> {
    if chunk.columns() != expected {
        return Err(Error::ColumnMismatch {
            expected: expected.to_vec(),
            found: chunk.columns().to_vec(),
        });
    }
    Ok(())
}
