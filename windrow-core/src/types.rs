use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-row index value used by value-range windows (commonly event time).
pub type IndexValue = i64;

/// Label identifying one group of a grouped aggregate.
pub type GroupKey = String;

/// An immutable batch of rows over named numeric columns.
///
/// Chunks are produced by the scheduler and consumed whole by an accumulation
/// step.  Storage is column-major.  A `NaN` cell means "missing": sums and
/// counts skip it, so a column's count can differ from the chunk's row count.
///
/// For value-range windowing a chunk additionally carries one [`IndexValue`]
/// per row; the engine requires indices to be non-decreasing within and
/// across chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    columns: Vec<String>,
    /// Column-major cells: `values[c][r]`.
    values: Vec<Vec<f64>>,
    rows: usize,
    index: Option<Vec<IndexValue>>,
}

impl Chunk {
    /// Build a chunk from `(name, values)` pairs.
    ///
    /// All columns must have the same length.
    pub fn from_columns<N: Into<String>>(columns: Vec<(N, Vec<f64>)>) -> Result<Self> {
        let mut names = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        let mut rows: Option<usize> = None;
        for (name, col) in columns {
            let name = name.into();
            match rows {
                None => rows = Some(col.len()),
                Some(r) if r != col.len() => {
                    return Err(Error::RaggedChunk {
                        column: name,
                        len: col.len(),
                        rows: r,
                    });
                }
                Some(_) => {}
            }
            names.push(name);
            values.push(col);
        }
        Ok(Self {
            columns: names,
            values,
            rows: rows.unwrap_or(0),
            index: None,
        })
    }

    /// Build a single-column chunk.
    pub fn of<N: Into<String>>(name: N, values: Vec<f64>) -> Result<Self> {
        Self::from_columns(vec![(name, values)])
    }

    /// Attach a per-row index (event time), consuming `self`.
    pub fn with_index(mut self, index: Vec<IndexValue>) -> Result<Self> {
        if index.len() != self.rows {
            return Err(Error::IndexLength {
                len: index.len(),
                rows: self.rows,
            });
        }
        self.index = Some(index);
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// True if the chunk has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names, in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cells of the named column, or `None` if absent.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// The per-row index, if this chunk carries one.
    pub fn index(&self) -> Option<&[IndexValue]> {
        self.index.as_deref()
    }

    /// Smallest index value, `None` when unindexed or empty.
    pub fn min_index(&self) -> Option<IndexValue> {
        self.index.as_ref().and_then(|i| i.iter().copied().min())
    }

    /// Largest index value, `None` when unindexed or empty.
    pub fn max_index(&self) -> Option<IndexValue> {
        self.index.as_ref().and_then(|i| i.iter().copied().max())
    }

    /// Per-column sum, skipping `NaN` cells.  Empty columns sum to zero.
    pub fn sums(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| !v.is_nan()).sum())
            .collect()
    }

    /// Per-column sum of squares, skipping `NaN` cells.
    pub fn sq_sums(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| !v.is_nan()).map(|v| v * v).sum())
            .collect()
    }

    /// Per-column count of non-`NaN` cells.
    pub fn counts(&self) -> Vec<i64> {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| !v.is_nan()).count() as i64)
            .collect()
    }

    /// Copy out the row range `[start, end)`, clamped to the chunk bounds.
    pub fn slice(&self, start: usize, end: usize) -> Chunk {
        let start = start.min(self.rows);
        let end = end.clamp(start, self.rows);
        Chunk {
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| col[start..end].to_vec())
                .collect(),
            rows: end - start,
            index: self.index.as_ref().map(|i| i[start..end].to_vec()),
        }
    }

    /// Split into `([0, at), [at, len))`.
    pub fn split_at(&self, at: usize) -> (Chunk, Chunk) {
        (self.slice(0, at), self.slice(at, self.rows))
    }

    /// A zero-row chunk with the same schema (and index presence).
    pub fn empty_like(&self) -> Chunk {
        self.slice(0, 0)
    }

    /// Concatenate `other`'s rows after this chunk's rows.
    ///
    /// Schemas must match exactly; both chunks must be indexed, or neither.
    pub fn append(&self, other: &Chunk) -> Result<Chunk> {
        if self.columns != other.columns {
            return Err(Error::ColumnMismatch {
                expected: self.columns.clone(),
                found: other.columns.clone(),
            });
        }
        let index = match (&self.index, &other.index) {
            (Some(a), Some(b)) => Some(a.iter().chain(b.iter()).copied().collect()),
            (None, None) => None,
            _ => return Err(Error::MixedIndex),
        };
        Ok(Chunk {
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a.iter().chain(b.iter()).copied().collect())
                .collect(),
            rows: self.rows + other.rows,
            index,
        })
    }
}

/// One value per column: the result shape of the scalar operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<T> {
    pub columns: Vec<String>,
    pub values: Vec<T>,
}

impl<T> Series<T> {
    pub fn new(columns: Vec<String>, values: Vec<T>) -> Self {
        Self { columns, values }
    }

    /// Value of the named column.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }
}

/// Per-group values for each aggregated column.
///
/// Group keys form a monotonically growing set: once a key has been observed
/// it stays in the table for the lifetime of the accumulator, even when
/// eviction drives its aggregate back to zero.  `BTreeMap` keeps the key
/// order deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTable<T> {
    pub columns: Vec<String>,
    pub groups: BTreeMap<GroupKey, Vec<T>>,
}

impl<T> GroupTable<T> {
    /// Per-column values for one group.
    pub fn get(&self, key: &str) -> Option<&[T]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Group keys in deterministic (sorted) order.
    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }
}

/// The authoritative result returned by every accumulation step.
///
/// Each operator variant produces exactly one of these shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AggValue {
    /// Per-column floating-point values (Sum, Mean, Var).
    Series(Series<f64>),
    /// Per-column exact integer counts (Count).
    Counts(Series<i64>),
    /// The raw rows currently retained (Full).
    Frame(Chunk),
    /// Per-group floating-point values (grouped Sum, Mean, Var).
    Grouped(GroupTable<f64>),
    /// Per-group exact integer counts (grouped Count).
    GroupedCounts(GroupTable<i64>),
}

impl AggValue {
    pub fn as_series(&self) -> Option<&Series<f64>> {
        match self {
            AggValue::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_counts(&self) -> Option<&Series<i64>> {
        match self {
            AggValue::Counts(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&Chunk> {
        match self {
            AggValue::Frame(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&GroupTable<f64>> {
        match self {
            AggValue::Grouped(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_grouped_counts(&self) -> Option<&GroupTable<i64>> {
        match self {
            AggValue::GroupedCounts(t) => Some(t),
            _ => None,
        }
    }

    /// The single value of a one-column [`AggValue::Series`] result.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            AggValue::Series(s) if s.values.len() == 1 => Some(s.values[0]),
            _ => None,
        }
    }

    /// The single value of a one-column [`AggValue::Counts`] result.
    pub fn scalar_count(&self) -> Option<i64> {
        match self {
            AggValue::Counts(s) if s.values.len() == 1 => Some(s.values[0]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_rejects_ragged_columns() {
        let err = Chunk::from_columns(vec![("a", vec![1.0, 2.0]), ("b", vec![3.0])]).unwrap_err();
        assert_eq!(
            err,
            Error::RaggedChunk {
                column: "b".to_string(),
                len: 1,
                rows: 2
            }
        );
    }

    #[test]
    fn test_chunk_rejects_bad_index_length() {
        let err = Chunk::of("x", vec![1.0, 2.0])
            .unwrap()
            .with_index(vec![0])
            .unwrap_err();
        assert_eq!(err, Error::IndexLength { len: 1, rows: 2 });
    }

    #[test]
    fn test_sums_and_counts_skip_nan() {
        let c = Chunk::of("x", vec![1.0, f64::NAN, 3.0]).unwrap();
        assert_eq!(c.sums(), vec![4.0]);
        assert_eq!(c.counts(), vec![2]);
        assert_eq!(c.sq_sums(), vec![10.0]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_slice_and_split() {
        let c = Chunk::of("x", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_index(vec![10, 20, 30, 40])
            .unwrap();
        let (head, tail) = c.split_at(1);
        assert_eq!(head.column("x"), Some(&[1.0][..]));
        assert_eq!(tail.column("x"), Some(&[2.0, 3.0, 4.0][..]));
        assert_eq!(tail.index(), Some(&[20, 30, 40][..]));
        // Out-of-bounds slices clamp instead of panicking.
        assert_eq!(c.slice(2, 99).len(), 2);
        assert_eq!(c.slice(99, 99).len(), 0);
    }

    #[test]
    fn test_append_keeps_schema_and_index() {
        let a = Chunk::of("x", vec![1.0]).unwrap().with_index(vec![1]).unwrap();
        let b = Chunk::of("x", vec![2.0]).unwrap().with_index(vec![2]).unwrap();
        let joined = a.append(&b).unwrap();
        assert_eq!(joined.column("x"), Some(&[1.0, 2.0][..]));
        assert_eq!(joined.index(), Some(&[1, 2][..]));

        let unindexed = Chunk::of("x", vec![3.0]).unwrap();
        assert_eq!(a.append(&unindexed).unwrap_err(), Error::MixedIndex);

        let other = Chunk::of("y", vec![3.0]).unwrap();
        assert!(matches!(
            a.append(&other).unwrap_err(),
            Error::ColumnMismatch { .. }
        ));
    }

    #[test]
    fn test_empty_like_preserves_shape() {
        let c = Chunk::from_columns(vec![("a", vec![1.0]), ("b", vec![2.0])])
            .unwrap()
            .with_index(vec![5])
            .unwrap();
        let empty = c.empty_like();
        assert!(empty.is_empty());
        assert_eq!(empty.columns(), c.columns());
        assert_eq!(empty.index(), Some(&[][..]));
    }

    #[test]
    fn test_agg_value_accessors() {
        let v = AggValue::Series(Series::new(vec!["x".to_string()], vec![7.0]));
        assert_eq!(v.scalar(), Some(7.0));
        assert!(v.as_counts().is_none());

        let c = AggValue::Counts(Series::new(vec!["x".to_string()], vec![3]));
        assert_eq!(c.scalar_count(), Some(3));
        assert!(c.scalar().is_none());
    }
}
