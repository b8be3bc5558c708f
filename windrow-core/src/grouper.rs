//! Grouper resolution: associating a per-row key sequence with a chunk.
//!
//! A grouped operator either carries a bound [`KeySource`] or expects keys to
//! arrive alongside each chunk.  [`resolve_keys`] applies the precedence
//! order and enforces one-to-one row alignment.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, GroupKey};

/// Where a grouped operator's keys come from when none are supplied per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySource {
    /// Derive keys from a named column of each chunk.
    Column(String),
}

impl KeySource {
    pub(crate) fn extract(&self, chunk: &Chunk) -> Result<Vec<GroupKey>> {
        match self {
            KeySource::Column(name) => {
                let col = chunk
                    .column(name)
                    .ok_or_else(|| Error::UnknownColumn(name.clone()))?;
                Ok(col.iter().map(|v| format_key(*v)).collect())
            }
        }
    }
}

/// Integral cell values become integer labels ("3", not "3.0").
fn format_key(v: f64) -> GroupKey {
    if v.is_finite() && v == v.trunc() {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Resolve the key sequence for `chunk`.
///
/// Precedence: explicit per-call keys, then the operator-bound source, then
/// keys paired with the chunk by the caller.  No source at all is a
/// configuration error ([`Error::MissingGrouper`]); a resolved sequence that
/// does not align row-for-row with the chunk is a schema error.
pub fn resolve_keys<'a>(
    explicit: Option<&'a [GroupKey]>,
    bound: Option<&KeySource>,
    paired: Option<&'a [GroupKey]>,
    chunk: &Chunk,
) -> Result<Cow<'a, [GroupKey]>> {
    let keys: Cow<'a, [GroupKey]> = if let Some(keys) = explicit {
        Cow::Borrowed(keys)
    } else if let Some(source) = bound {
        Cow::Owned(source.extract(chunk)?)
    } else if let Some(keys) = paired {
        Cow::Borrowed(keys)
    } else {
        return Err(Error::MissingGrouper);
    };
    if keys.len() != chunk.len() {
        return Err(Error::KeyCountMismatch {
            keys: keys.len(),
            rows: chunk.len(),
        });
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed_chunk() -> Chunk {
        Chunk::from_columns(vec![("k", vec![1.0, 2.0, 1.0]), ("v", vec![10.0, 20.0, 30.0])])
            .unwrap()
    }

    #[test]
    fn test_column_source_formats_integral_keys() {
        let source = KeySource::Column("k".to_string());
        let keys = source.extract(&keyed_chunk()).unwrap();
        assert_eq!(keys, vec!["1", "2", "1"]);
    }

    #[test]
    fn test_column_source_rejects_unknown_column() {
        let source = KeySource::Column("missing".to_string());
        assert_eq!(
            source.extract(&keyed_chunk()).unwrap_err(),
            Error::UnknownColumn("missing".to_string())
        );
    }

    #[test]
    fn test_resolution_precedence() {
        let chunk = keyed_chunk();
        let bound = KeySource::Column("k".to_string());
        let explicit: Vec<GroupKey> = vec!["a".into(), "b".into(), "c".into()];
        let paired: Vec<GroupKey> = vec!["x".into(), "y".into(), "z".into()];

        // Explicit wins over the bound source and paired keys.
        let keys = resolve_keys(Some(&explicit), Some(&bound), Some(&paired), &chunk).unwrap();
        assert_eq!(&*keys, &explicit[..]);

        // Bound source wins over paired keys.
        let keys = resolve_keys(None, Some(&bound), Some(&paired), &chunk).unwrap();
        assert_eq!(&*keys, &["1", "2", "1"][..]);

        // Paired keys are the fallback.
        let keys = resolve_keys(None, None, Some(&paired), &chunk).unwrap();
        assert_eq!(&*keys, &paired[..]);
    }

    #[test]
    fn test_no_source_is_a_config_error() {
        let err = resolve_keys(None, None, None, &keyed_chunk()).unwrap_err();
        assert_eq!(err, Error::MissingGrouper);
        assert!(err.is_config());
    }

    #[test]
    fn test_misaligned_keys_rejected() {
        let short: Vec<GroupKey> = vec!["a".into()];
        let err = resolve_keys(Some(&short), None, None, &keyed_chunk()).unwrap_err();
        assert_eq!(err, Error::KeyCountMismatch { keys: 1, rows: 3 });
    }
}
