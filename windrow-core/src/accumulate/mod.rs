//! Accumulation orchestrators: the drivers that sequence operator calls.
//!
//! Each driver is a pure state-transition function invoked once per chunk:
//! `step(prior_state, chunk)` returns the successor state and the single
//! authoritative result for that arrival.  State is created lazily on the
//! first chunk and owned exclusively by the caller between steps; the engine
//! itself never blocks, retries, or touches I/O.
//!
//! - [`Expanding`] — cumulative ("since start") accumulation, no eviction
//! - [`Windowed`]  — bounded accumulation over a row-count or value-range
//!   window, with a retained chunk queue driving exact eviction
//! - [`Grouped`]   — expanding accumulation partitioned by a per-row key
//!   sequence (windowed group-by is not supported)

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{Aggregation, GroupedAggregation};
use crate::error::{Error, Result};
use crate::grouper::resolve_keys;
use crate::types::{AggValue, Chunk, GroupKey};
use crate::window::{diff_row_count, diff_value_range, WindowSpec};

#[cfg(test)]
#[path = "tests/accumulate_tests.rs"]
mod tests;

// ── Expanding ─────────────────────────────────────────────────────────────────

/// Unwindowed accumulation: every chunk ever delivered keeps contributing.
#[derive(Debug, Clone)]
pub struct Expanding<A> {
    agg: A,
}

impl<A: Aggregation> Expanding<A> {
    pub fn new(agg: A) -> Self {
        Self { agg }
    }

    pub fn aggregation(&self) -> &A {
        &self.agg
    }

    /// Apply one chunk.  `prior = None` signals the first call and triggers
    /// `initial`.
    pub fn step(&self, prior: Option<A::State>, chunk: &Chunk) -> Result<(A::State, AggValue)> {
        let state = match prior {
            Some(state) => state,
            None => self.agg.initial(chunk)?,
        };
        self.agg.on_new(state, chunk)
    }
}

// ── Windowed ──────────────────────────────────────────────────────────────────

/// State carried between windowed steps: the raw rows currently inside the
/// window boundary plus the accumulator over exactly those rows.
///
/// The queue is needed because the boundary is recomputed relative to the
/// latest arrival, so eviction must inspect real rows, not aggregate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowState<S> {
    retained: VecDeque<Chunk>,
    state: S,
}

impl<S> WindowState<S> {
    /// Total rows currently inside the window.
    pub fn retained_rows(&self) -> usize {
        self.retained.iter().map(Chunk::len).sum()
    }

    /// The retained chunks, oldest first.
    pub fn retained(&self) -> impl Iterator<Item = &Chunk> {
        self.retained.iter()
    }

    /// The accumulator over the retained rows.
    pub fn aggregate(&self) -> &S {
        &self.state
    }
}

/// Bounded accumulation over a row-count or value-range window.
#[derive(Debug, Clone)]
pub struct Windowed<A> {
    agg: A,
    window: WindowSpec,
}

impl<A: Aggregation> Windowed<A> {
    /// Build a windowed driver.  The window must be bounded and its width
    /// positive; violations are configuration errors.
    pub fn new(agg: A, window: WindowSpec) -> Result<Self> {
        window.validate()?;
        if !window.is_bounded() {
            return Err(Error::UnboundedWindow);
        }
        Ok(Self { agg, window })
    }

    pub fn aggregation(&self) -> &A {
        &self.agg
    }

    pub fn window(&self) -> WindowSpec {
        self.window
    }

    /// Apply one chunk: run the diff strategy, fold the new rows in, then
    /// retire each evicted portion, oldest first.
    ///
    /// `on_old` runs strictly after `on_new` so that when an arrival and
    /// evictions happen in the same step the returned result reflects both.
    /// A step that applies neither (empty chunk, nothing evicted) reads the
    /// result from the accumulator directly.
    pub fn step(
        &self,
        prior: Option<WindowState<A::State>>,
        chunk: &Chunk,
    ) -> Result<(WindowState<A::State>, AggValue)> {
        let WindowState { retained, state } = match prior {
            Some(state) => state,
            None => WindowState {
                retained: VecDeque::new(),
                state: self.agg.initial(chunk)?,
            },
        };
        let (retained, evicted) = match self.window {
            WindowSpec::RowCount(width) => diff_row_count(retained, chunk.clone(), width),
            WindowSpec::ValueRange(width) => diff_value_range(retained, chunk.clone(), width)?,
            // The constructor rejects unbounded windows.
            WindowSpec::Unbounded => return Err(Error::UnboundedWindow),
        };

        let mut state = state;
        let mut out = None;
        if !chunk.is_empty() {
            let (next, value) = self.agg.on_new(state, chunk)?;
            state = next;
            out = Some(value);
        }
        for old in &evicted {
            if old.is_empty() {
                continue;
            }
            let (next, value) = self.agg.on_old(state, old)?;
            state = next;
            out = Some(value);
        }
        debug!(
            arrived = chunk.len(),
            evicted = evicted.iter().map(Chunk::len).sum::<usize>(),
            "windowed step"
        );
        let value = out.unwrap_or_else(|| self.agg.current(&state));
        Ok((WindowState { retained, state }, value))
    }
}

// ── Grouped ───────────────────────────────────────────────────────────────────

/// Expanding accumulation partitioned per group key.
///
/// Before delegating to the operator the driver resolves the key sequence
/// for the chunk: explicit per-call keys beat the operator-bound source,
/// which beats keys paired with the chunk.  There is no windowed grouped
/// variant.
#[derive(Debug, Clone)]
pub struct Grouped<G> {
    agg: G,
}

impl<G: GroupedAggregation> Grouped<G> {
    pub fn new(agg: G) -> Self {
        Self { agg }
    }

    pub fn aggregation(&self) -> &G {
        &self.agg
    }

    /// Apply one chunk, with `paired` carrying any keys delivered alongside
    /// it by the scheduler.
    pub fn step(
        &self,
        prior: Option<G::State>,
        chunk: &Chunk,
        paired: Option<&[GroupKey]>,
    ) -> Result<(G::State, AggValue)> {
        self.step_with(prior, chunk, None, paired)
    }

    /// Like [`step`](Self::step), but with an explicit per-call key sequence
    /// that takes precedence over every other source.
    pub fn step_with(
        &self,
        prior: Option<G::State>,
        chunk: &Chunk,
        explicit: Option<&[GroupKey]>,
        paired: Option<&[GroupKey]>,
    ) -> Result<(G::State, AggValue)> {
        let keys = resolve_keys(explicit, self.agg.grouping().key_source(), paired, chunk)?;
        let state = match prior {
            Some(state) => state,
            None => self.agg.initial(chunk, &keys)?,
        };
        self.agg.on_new(state, chunk, &keys)
    }
}
