use serde::{Deserialize, Serialize};

use super::*;

// ── Sum ───────────────────────────────────────────────────────────────────────

/// Running per-column totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumState {
    columns: Vec<String>,
    totals: Vec<f64>,
}

impl Aggregation for Sum {
    type State = SumState;

    fn initial(&self, chunk: &Chunk) -> Result<SumState> {
        Ok(SumState {
            columns: chunk.columns().to_vec(),
            totals: vec![0.0; chunk.columns().len()],
        })
    }

    fn on_new(&self, mut state: SumState, chunk: &Chunk) -> Result<(SumState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (total, s) in state.totals.iter_mut().zip(chunk.sums()) {
            *total += s;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(&self, mut state: SumState, chunk: &Chunk) -> Result<(SumState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (total, s) in state.totals.iter_mut().zip(chunk.sums()) {
            *total -= s;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &SumState) -> AggValue {
        AggValue::Series(Series::new(state.columns.clone(), state.totals.clone()))
    }
}

// ── Count ─────────────────────────────────────────────────────────────────────

/// Running per-column counts of non-missing cells.  Exact integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountState {
    columns: Vec<String>,
    counts: Vec<i64>,
}

impl Aggregation for Count {
    type State = CountState;

    fn initial(&self, chunk: &Chunk) -> Result<CountState> {
        Ok(CountState {
            columns: chunk.columns().to_vec(),
            counts: vec![0; chunk.columns().len()],
        })
    }

    fn on_new(&self, mut state: CountState, chunk: &Chunk) -> Result<(CountState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (count, c) in state.counts.iter_mut().zip(chunk.counts()) {
            *count += c;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(&self, mut state: CountState, chunk: &Chunk) -> Result<(CountState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (count, c) in state.counts.iter_mut().zip(chunk.counts()) {
            *count -= c;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &CountState) -> AggValue {
        AggValue::Counts(Series::new(state.columns.clone(), state.counts.clone()))
    }
}

// ── Mean ──────────────────────────────────────────────────────────────────────

/// Running per-column totals and counts; the result is their quotient.
///
/// An empty window yields `NaN` (0/0), which is a normal value here, not an
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanState {
    columns: Vec<String>,
    totals: Vec<f64>,
    counts: Vec<i64>,
}

impl Aggregation for Mean {
    type State = MeanState;

    fn initial(&self, chunk: &Chunk) -> Result<MeanState> {
        let n = chunk.columns().len();
        Ok(MeanState {
            columns: chunk.columns().to_vec(),
            totals: vec![0.0; n],
            counts: vec![0; n],
        })
    }

    fn on_new(&self, mut state: MeanState, chunk: &Chunk) -> Result<(MeanState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (total, s) in state.totals.iter_mut().zip(chunk.sums()) {
            *total += s;
        }
        for (count, c) in state.counts.iter_mut().zip(chunk.counts()) {
            *count += c;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(&self, mut state: MeanState, chunk: &Chunk) -> Result<(MeanState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (total, s) in state.totals.iter_mut().zip(chunk.sums()) {
            *total -= s;
        }
        for (count, c) in state.counts.iter_mut().zip(chunk.counts()) {
            *count -= c;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &MeanState) -> AggValue {
        let values = state
            .totals
            .iter()
            .zip(&state.counts)
            .map(|(t, c)| t / *c as f64)
            .collect();
        AggValue::Series(Series::new(state.columns.clone(), values))
    }
}

// ── Var ───────────────────────────────────────────────────────────────────────

/// Running variance from the (Σx, Σx², n) triple.
///
/// `ddof` is the delta-degrees-of-freedom bias correction (1 gives the
/// sample variance, 0 the population variance).  `n <= ddof` yields `NaN`.
#[derive(Debug, Clone, Copy)]
pub struct Var {
    ddof: u32,
}

impl Var {
    /// Sample variance (`ddof = 1`).
    pub fn new() -> Self {
        Self { ddof: 1 }
    }

    pub fn with_ddof(ddof: u32) -> Self {
        Self { ddof }
    }

    pub fn ddof(&self) -> u32 {
        self.ddof
    }
}

impl Default for Var {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarState {
    columns: Vec<String>,
    sums: Vec<f64>,
    sq_sums: Vec<f64>,
    counts: Vec<i64>,
}

/// `(Σx²/n − (Σx/n)²) · n/(n − ddof)`, with the scale factor skipped when
/// `ddof` is zero.  Undefined inputs (`n == 0`, `n <= ddof`) give `NaN`.
pub(crate) fn variance(x: f64, x2: f64, n: i64, ddof: u32) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    let nf = n as f64;
    let raw = x2 / nf - (x / nf) * (x / nf);
    if ddof == 0 {
        raw
    } else if n <= i64::from(ddof) {
        f64::NAN
    } else {
        raw * nf / (nf - f64::from(ddof))
    }
}

impl Aggregation for Var {
    type State = VarState;

    fn initial(&self, chunk: &Chunk) -> Result<VarState> {
        let n = chunk.columns().len();
        Ok(VarState {
            columns: chunk.columns().to_vec(),
            sums: vec![0.0; n],
            sq_sums: vec![0.0; n],
            counts: vec![0; n],
        })
    }

    fn on_new(&self, mut state: VarState, chunk: &Chunk) -> Result<(VarState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (x, s) in state.sums.iter_mut().zip(chunk.sums()) {
            *x += s;
        }
        for (x2, s) in state.sq_sums.iter_mut().zip(chunk.sq_sums()) {
            *x2 += s;
        }
        for (n, c) in state.counts.iter_mut().zip(chunk.counts()) {
            *n += c;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(&self, mut state: VarState, chunk: &Chunk) -> Result<(VarState, AggValue)> {
        check_columns(&state.columns, chunk)?;
        for (x, s) in state.sums.iter_mut().zip(chunk.sums()) {
            *x -= s;
        }
        for (x2, s) in state.sq_sums.iter_mut().zip(chunk.sq_sums()) {
            *x2 -= s;
        }
        for (n, c) in state.counts.iter_mut().zip(chunk.counts()) {
            *n -= c;
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &VarState) -> AggValue {
        let values = state
            .sums
            .iter()
            .zip(&state.sq_sums)
            .zip(&state.counts)
            .map(|((x, x2), n)| variance(*x, *x2, *n, self.ddof))
            .collect();
        AggValue::Series(Series::new(state.columns.clone(), values))
    }
}

// ── Full ──────────────────────────────────────────────────────────────────────

/// Raw windowed retention: no reduction at all.
///
/// The state is the concatenation of every retained row; `on_old` drops the
/// exited rows by position from the front instead of subtracting
/// arithmetically.
#[derive(Debug, Clone, Copy, Default)]
pub struct Full;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullState {
    held: Chunk,
}

impl Aggregation for Full {
    type State = FullState;

    fn initial(&self, chunk: &Chunk) -> Result<FullState> {
        Ok(FullState {
            held: chunk.empty_like(),
        })
    }

    fn on_new(&self, state: FullState, chunk: &Chunk) -> Result<(FullState, AggValue)> {
        check_columns(state.held.columns(), chunk)?;
        let held = state.held.append(chunk)?;
        let state = FullState { held };
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(&self, state: FullState, chunk: &Chunk) -> Result<(FullState, AggValue)> {
        check_columns(state.held.columns(), chunk)?;
        let held = state.held.slice(chunk.len(), state.held.len());
        let state = FullState { held };
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &FullState) -> AggValue {
        AggValue::Frame(state.held.clone())
    }

    fn stateless(&self, chunk: &Chunk) -> Result<AggValue> {
        Ok(AggValue::Frame(chunk.clone()))
    }
}
