use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::*;
use crate::grouper::KeySource;
use crate::types::GroupTable;

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Shared configuration for the grouped operators: where the keys come from
/// and which value columns to aggregate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grouping {
    key_source: Option<KeySource>,
    columns: Option<Vec<String>>,
}

impl Grouping {
    /// Keys arrive paired with each chunk (or per call); nothing is bound.
    pub fn paired() -> Self {
        Self::default()
    }

    /// Bind keys to a named column of each chunk.  That column is excluded
    /// from the aggregated values.
    pub fn by_column(name: impl Into<String>) -> Self {
        Self {
            key_source: Some(KeySource::Column(name.into())),
            columns: None,
        }
    }

    /// Restrict aggregation to the named value columns.
    pub fn columns<N: Into<String>>(mut self, columns: impl IntoIterator<Item = N>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// The bound key source, if any.
    pub fn key_source(&self) -> Option<&KeySource> {
        self.key_source.as_ref()
    }

    /// The columns this grouping aggregates for `chunk`.
    pub(crate) fn value_columns(&self, chunk: &Chunk) -> Result<Vec<String>> {
        if let Some(selection) = &self.columns {
            for name in selection {
                if chunk.column(name).is_none() {
                    return Err(Error::UnknownColumn(name.clone()));
                }
            }
            return Ok(selection.clone());
        }
        let key_column = match &self.key_source {
            Some(KeySource::Column(name)) => Some(name.as_str()),
            None => None,
        };
        Ok(chunk
            .columns()
            .iter()
            .filter(|c| Some(c.as_str()) != key_column)
            .cloned()
            .collect())
    }
}

// ── GroupedAggregation ────────────────────────────────────────────────────────

/// A decomposable aggregate partitioned by a per-row key sequence.
///
/// The result maps each group key to its per-column aggregate.  Keys are
/// aligned against the existing key set with zero fill on both add and
/// subtract, so the key set only ever grows.
pub trait GroupedAggregation {
    /// Sufficient statistic carried between steps.
    type State;

    /// The grouping configuration, consulted by the orchestrator to resolve
    /// keys before delegating.
    fn grouping(&self) -> &Grouping;

    /// A zero-valued accumulator shaped like an empty slice of `chunk`'s
    /// schema (no groups yet).
    fn initial(&self, chunk: &Chunk, keys: &[GroupKey]) -> Result<Self::State>;

    /// Fold a newly arrived chunk in, zero-initializing newly seen keys.
    fn on_new(
        &self,
        state: Self::State,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(Self::State, AggValue)>;

    /// Subtract a chunk whose rows have exited the window.
    fn on_old(
        &self,
        state: Self::State,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(Self::State, AggValue)>;

    /// The current result, recomputed from the accumulator alone.
    fn current(&self, state: &Self::State) -> AggValue;

    /// Single-shot evaluation that carries no state.
    fn stateless(&self, chunk: &Chunk, keys: &[GroupKey]) -> Result<AggValue> {
        let state = self.initial(chunk, keys)?;
        Ok(self.on_new(state, chunk, keys)?.1)
    }
}

// ── Row bucketing ─────────────────────────────────────────────────────────────

/// Per-group contribution of one chunk over the given value columns.
struct Bucket {
    sums: Vec<f64>,
    sq_sums: Vec<f64>,
    counts: Vec<i64>,
}

impl Bucket {
    fn zeroed(width: usize) -> Self {
        Self {
            sums: vec![0.0; width],
            sq_sums: vec![0.0; width],
            counts: vec![0; width],
        }
    }
}

fn bucket(chunk: &Chunk, keys: &[GroupKey], columns: &[String]) -> Result<BTreeMap<GroupKey, Bucket>> {
    if keys.len() != chunk.len() {
        return Err(Error::KeyCountMismatch {
            keys: keys.len(),
            rows: chunk.len(),
        });
    }
    let cols: Vec<&[f64]> = columns
        .iter()
        .map(|name| {
            chunk
                .column(name)
                .ok_or_else(|| Error::UnknownColumn(name.clone()))
        })
        .collect::<Result<_>>()?;
    let mut out: BTreeMap<GroupKey, Bucket> = BTreeMap::new();
    for (row, key) in keys.iter().enumerate() {
        let b = out
            .entry(key.clone())
            .or_insert_with(|| Bucket::zeroed(columns.len()));
        for (j, col) in cols.iter().enumerate() {
            let v = col[row];
            if !v.is_nan() {
                b.sums[j] += v;
                b.sq_sums[j] += v * v;
                b.counts[j] += 1;
            }
        }
    }
    Ok(out)
}

fn check_value_columns(grouping: &Grouping, expected: &[String], chunk: &Chunk) -> Result<()> {
    let found = grouping.value_columns(chunk)?;
    if found != expected {
        return Err(Error::ColumnMismatch {
            expected: expected.to_vec(),
            found,
        });
    }
    Ok(())
}

// ── GroupedSum ────────────────────────────────────────────────────────────────

/// Per-group running totals.
#[derive(Debug, Clone, Default)]
pub struct GroupedSum {
    grouping: Grouping,
}

impl GroupedSum {
    pub fn new(grouping: Grouping) -> Self {
        Self { grouping }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedSumState {
    columns: Vec<String>,
    groups: BTreeMap<GroupKey, Vec<f64>>,
}

impl GroupedAggregation for GroupedSum {
    type State = GroupedSumState;

    fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    fn initial(&self, chunk: &Chunk, _keys: &[GroupKey]) -> Result<GroupedSumState> {
        Ok(GroupedSumState {
            columns: self.grouping.value_columns(chunk)?,
            groups: BTreeMap::new(),
        })
    }

    fn on_new(
        &self,
        mut state: GroupedSumState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedSumState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let totals = state.groups.entry(key).or_insert_with(|| vec![0.0; width]);
            for (t, s) in totals.iter_mut().zip(&b.sums) {
                *t += s;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(
        &self,
        mut state: GroupedSumState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedSumState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let totals = state.groups.entry(key).or_insert_with(|| vec![0.0; width]);
            for (t, s) in totals.iter_mut().zip(&b.sums) {
                *t -= s;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &GroupedSumState) -> AggValue {
        AggValue::Grouped(GroupTable {
            columns: state.columns.clone(),
            groups: state.groups.clone(),
        })
    }
}

// ── GroupedCount ──────────────────────────────────────────────────────────────

/// Per-group counts of non-missing cells.  Exact integers.
#[derive(Debug, Clone, Default)]
pub struct GroupedCount {
    grouping: Grouping,
}

impl GroupedCount {
    pub fn new(grouping: Grouping) -> Self {
        Self { grouping }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedCountState {
    columns: Vec<String>,
    groups: BTreeMap<GroupKey, Vec<i64>>,
}

impl GroupedAggregation for GroupedCount {
    type State = GroupedCountState;

    fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    fn initial(&self, chunk: &Chunk, _keys: &[GroupKey]) -> Result<GroupedCountState> {
        Ok(GroupedCountState {
            columns: self.grouping.value_columns(chunk)?,
            groups: BTreeMap::new(),
        })
    }

    fn on_new(
        &self,
        mut state: GroupedCountState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedCountState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let counts = state.groups.entry(key).or_insert_with(|| vec![0; width]);
            for (n, c) in counts.iter_mut().zip(&b.counts) {
                *n += c;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(
        &self,
        mut state: GroupedCountState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedCountState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let counts = state.groups.entry(key).or_insert_with(|| vec![0; width]);
            for (n, c) in counts.iter_mut().zip(&b.counts) {
                *n -= c;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &GroupedCountState) -> AggValue {
        AggValue::GroupedCounts(GroupTable {
            columns: state.columns.clone(),
            groups: state.groups.clone(),
        })
    }
}

// ── GroupedMean ───────────────────────────────────────────────────────────────

/// Per-group running totals and counts; the result is their quotient.
#[derive(Debug, Clone, Default)]
pub struct GroupedMean {
    grouping: Grouping,
}

impl GroupedMean {
    pub fn new(grouping: Grouping) -> Self {
        Self { grouping }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanCell {
    totals: Vec<f64>,
    counts: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedMeanState {
    columns: Vec<String>,
    groups: BTreeMap<GroupKey, MeanCell>,
}

impl GroupedAggregation for GroupedMean {
    type State = GroupedMeanState;

    fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    fn initial(&self, chunk: &Chunk, _keys: &[GroupKey]) -> Result<GroupedMeanState> {
        Ok(GroupedMeanState {
            columns: self.grouping.value_columns(chunk)?,
            groups: BTreeMap::new(),
        })
    }

    fn on_new(
        &self,
        mut state: GroupedMeanState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedMeanState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let cell = state.groups.entry(key).or_insert_with(|| MeanCell {
                totals: vec![0.0; width],
                counts: vec![0; width],
            });
            for (t, s) in cell.totals.iter_mut().zip(&b.sums) {
                *t += s;
            }
            for (n, c) in cell.counts.iter_mut().zip(&b.counts) {
                *n += c;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(
        &self,
        mut state: GroupedMeanState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedMeanState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let cell = state.groups.entry(key).or_insert_with(|| MeanCell {
                totals: vec![0.0; width],
                counts: vec![0; width],
            });
            for (t, s) in cell.totals.iter_mut().zip(&b.sums) {
                *t -= s;
            }
            for (n, c) in cell.counts.iter_mut().zip(&b.counts) {
                *n -= c;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &GroupedMeanState) -> AggValue {
        let groups = state
            .groups
            .iter()
            .map(|(key, cell)| {
                let means = cell
                    .totals
                    .iter()
                    .zip(&cell.counts)
                    .map(|(t, c)| t / *c as f64)
                    .collect();
                (key.clone(), means)
            })
            .collect();
        AggValue::Grouped(GroupTable {
            columns: state.columns.clone(),
            groups,
        })
    }
}

// ── GroupedVar ────────────────────────────────────────────────────────────────

/// Per-group running variance from the (Σx, Σx², n) triple.
#[derive(Debug, Clone)]
pub struct GroupedVar {
    grouping: Grouping,
    ddof: u32,
}

impl GroupedVar {
    /// Sample variance (`ddof = 1`).
    pub fn new(grouping: Grouping) -> Self {
        Self { grouping, ddof: 1 }
    }

    pub fn with_ddof(grouping: Grouping, ddof: u32) -> Self {
        Self { grouping, ddof }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarCell {
    sums: Vec<f64>,
    sq_sums: Vec<f64>,
    counts: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedVarState {
    columns: Vec<String>,
    groups: BTreeMap<GroupKey, VarCell>,
}

impl GroupedAggregation for GroupedVar {
    type State = GroupedVarState;

    fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    fn initial(&self, chunk: &Chunk, _keys: &[GroupKey]) -> Result<GroupedVarState> {
        Ok(GroupedVarState {
            columns: self.grouping.value_columns(chunk)?,
            groups: BTreeMap::new(),
        })
    }

    fn on_new(
        &self,
        mut state: GroupedVarState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedVarState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let cell = state.groups.entry(key).or_insert_with(|| VarCell {
                sums: vec![0.0; width],
                sq_sums: vec![0.0; width],
                counts: vec![0; width],
            });
            for (x, s) in cell.sums.iter_mut().zip(&b.sums) {
                *x += s;
            }
            for (x2, s) in cell.sq_sums.iter_mut().zip(&b.sq_sums) {
                *x2 += s;
            }
            for (n, c) in cell.counts.iter_mut().zip(&b.counts) {
                *n += c;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn on_old(
        &self,
        mut state: GroupedVarState,
        chunk: &Chunk,
        keys: &[GroupKey],
    ) -> Result<(GroupedVarState, AggValue)> {
        check_value_columns(&self.grouping, &state.columns, chunk)?;
        let width = state.columns.len();
        for (key, b) in bucket(chunk, keys, &state.columns)? {
            let cell = state.groups.entry(key).or_insert_with(|| VarCell {
                sums: vec![0.0; width],
                sq_sums: vec![0.0; width],
                counts: vec![0; width],
            });
            for (x, s) in cell.sums.iter_mut().zip(&b.sums) {
                *x -= s;
            }
            for (x2, s) in cell.sq_sums.iter_mut().zip(&b.sq_sums) {
                *x2 -= s;
            }
            for (n, c) in cell.counts.iter_mut().zip(&b.counts) {
                *n -= c;
            }
        }
        let value = self.current(&state);
        Ok((state, value))
    }

    fn current(&self, state: &GroupedVarState) -> AggValue {
        let groups = state
            .groups
            .iter()
            .map(|(key, cell)| {
                let vars = cell
                    .sums
                    .iter()
                    .zip(&cell.sq_sums)
                    .zip(&cell.counts)
                    .map(|((x, x2), n)| variance(*x, *x2, *n, self.ddof))
                    .collect();
                (key.clone(), vars)
            })
            .collect();
        AggValue::Grouped(GroupTable {
            columns: state.columns.clone(),
            groups,
        })
    }
}
