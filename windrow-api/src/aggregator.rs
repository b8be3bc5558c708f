//! Owned aggregator handles.
//!
//! The core drivers are pure functions over caller-owned state.  The handles
//! here own that state and thread it through each step, which is the shape
//! most callers want: construct once, feed chunks, read results.
//!
//! A failed step leaves the handle exactly as it was, so a caller can drop
//! the offending chunk and keep going.

use windrow_core::accumulate::{Expanding, Grouped, WindowState, Windowed};
use windrow_core::aggregate::{Aggregation, GroupedAggregation};
use windrow_core::types::{AggValue, Chunk, GroupKey};
use windrow_core::window::WindowSpec;
use windrow_core::Result;

// ── StreamAggregator ──────────────────────────────────────────────────────────

enum Driver<A: Aggregation> {
    Expanding {
        driver: Expanding<A>,
        state: Option<A::State>,
    },
    Windowed {
        driver: Windowed<A>,
        state: Option<WindowState<A::State>>,
    },
}

/// A scalar aggregator bound to one window discipline.
///
/// [`WindowSpec::Unbounded`] selects expanding (cumulative) accumulation;
/// bounded specs select windowed accumulation with eviction.
pub struct StreamAggregator<A: Aggregation> {
    driver: Driver<A>,
}

impl<A: Aggregation> StreamAggregator<A>
where
    A::State: Clone,
{
    /// Build a handle.  Bounded windows must have positive width.
    pub fn new(agg: A, window: WindowSpec) -> Result<Self> {
        window.validate()?;
        let driver = if window.is_bounded() {
            Driver::Windowed {
                driver: Windowed::new(agg, window)?,
                state: None,
            }
        } else {
            Driver::Expanding {
                driver: Expanding::new(agg),
                state: None,
            }
        };
        Ok(Self { driver })
    }

    /// Feed one chunk and return the authoritative result for this step.
    ///
    /// On error the internal state is untouched; the step can be retried or
    /// the chunk dropped.
    pub fn step(&mut self, chunk: &Chunk) -> Result<AggValue> {
        match &mut self.driver {
            Driver::Expanding { driver, state } => {
                let (next, value) = driver.step(state.clone(), chunk)?;
                *state = Some(next);
                Ok(value)
            }
            Driver::Windowed { driver, state } => {
                let (next, value) = driver.step(state.clone(), chunk)?;
                *state = Some(next);
                Ok(value)
            }
        }
    }

    /// The standing result, or `None` before the first step.
    pub fn current(&self) -> Option<AggValue> {
        match &self.driver {
            Driver::Expanding { driver, state } => {
                state.as_ref().map(|s| driver.aggregation().current(s))
            }
            Driver::Windowed { driver, state } => state
                .as_ref()
                .map(|s| driver.aggregation().current(s.aggregate())),
        }
    }

    /// Rows currently inside the window; `None` for expanding handles.
    pub fn retained_rows(&self) -> Option<usize> {
        match &self.driver {
            Driver::Expanding { .. } => None,
            Driver::Windowed { state, .. } => {
                Some(state.as_ref().map_or(0, WindowState::retained_rows))
            }
        }
    }
}

// ── GroupedStreamAggregator ───────────────────────────────────────────────────

/// An expanding per-group aggregator.
///
/// Keys come from the operator's bound source (for example a key column) or
/// from an explicit per-call sequence via [`step_keyed`](Self::step_keyed),
/// which takes precedence.
pub struct GroupedStreamAggregator<G: GroupedAggregation> {
    driver: Grouped<G>,
    state: Option<G::State>,
}

impl<G: GroupedAggregation> GroupedStreamAggregator<G>
where
    G::State: Clone,
{
    pub fn new(agg: G) -> Self {
        Self {
            driver: Grouped::new(agg),
            state: None,
        }
    }

    /// Feed one chunk, resolving keys from the operator's bound source.
    pub fn step(&mut self, chunk: &Chunk) -> Result<AggValue> {
        let (next, value) = self.driver.step(self.state.clone(), chunk, None)?;
        self.state = Some(next);
        Ok(value)
    }

    /// Feed one chunk with an explicit key per row.
    pub fn step_keyed(&mut self, chunk: &Chunk, keys: &[GroupKey]) -> Result<AggValue> {
        let (next, value) = self
            .driver
            .step_with(self.state.clone(), chunk, Some(keys), None)?;
        self.state = Some(next);
        Ok(value)
    }

    /// The standing result, or `None` before the first step.
    pub fn current(&self) -> Option<AggValue> {
        self.state
            .as_ref()
            .map(|s| self.driver.aggregation().current(s))
    }
}
