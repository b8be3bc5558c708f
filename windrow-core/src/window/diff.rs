use std::collections::VecDeque;

use tracing::trace;

use super::*;
use crate::types::{Chunk, IndexValue};

// ── Row-count windows ─────────────────────────────────────────────────────────

/// Append `incoming` to the retained queue, then evict whole or partial
/// chunks from the oldest end until at most `width` rows remain.
///
/// Returns the updated queue and the evicted portions, oldest first.  Row
/// order is preserved within and across evicted portions, and nothing inside
/// the new window boundary is ever evicted.
pub fn diff_row_count(
    mut retained: VecDeque<Chunk>,
    incoming: Chunk,
    width: usize,
) -> (VecDeque<Chunk>, Vec<Chunk>) {
    retained.push_back(incoming);
    let total: usize = retained.iter().map(Chunk::len).sum();
    let mut overflow = total.saturating_sub(width);
    let mut evicted = Vec::new();
    while overflow > 0 {
        let Some(head) = retained.pop_front() else {
            break;
        };
        if head.len() <= overflow {
            overflow -= head.len();
            evicted.push(head);
        } else {
            let (old, keep) = head.split_at(overflow);
            evicted.push(old);
            retained.push_front(keep);
            overflow = 0;
        }
    }
    trace!(
        total,
        width,
        evicted = evicted.len(),
        "row-count window diff"
    );
    (retained, evicted)
}

// ── Value-range windows ───────────────────────────────────────────────────────

/// Append `incoming` to the retained queue, then evict every row whose index
/// falls strictly below `max_index - width`.
///
/// A row whose index equals the boundary stays in the window.  Chunks that
/// lose all of their rows are dropped from the queue entirely.
///
/// Indices must be non-decreasing within the incoming chunk and must not
/// regress below the largest index already retained; a violation is rejected
/// with [`Error::IndexRegression`] before any state is touched.
pub fn diff_value_range(
    mut retained: VecDeque<Chunk>,
    incoming: Chunk,
    width: IndexValue,
) -> Result<(VecDeque<Chunk>, Vec<Chunk>)> {
    if !incoming.is_empty() {
        let idx = incoming.index().ok_or(Error::MissingIndex)?;
        if let Some(pair) = idx.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(Error::IndexRegression {
                prev: pair[0],
                next: pair[1],
            });
        }
        if let Some(prev) = retained.iter().filter_map(Chunk::max_index).max() {
            if idx[0] < prev {
                return Err(Error::IndexRegression {
                    prev,
                    next: idx[0],
                });
            }
        }
    }
    retained.push_back(incoming);

    let Some(mx) = retained.iter().filter_map(Chunk::max_index).max() else {
        // Only empty chunks so far: nothing can age out.
        return Ok((retained, Vec::new()));
    };
    let low = mx - width;

    let mut evicted = Vec::new();
    while let Some(head) = retained.pop_front() {
        if head.is_empty() {
            continue;
        }
        let Some(idx) = head.index() else {
            return Err(Error::MissingIndex);
        };
        // Rows arrive sorted, so the eviction prefix is a partition point.
        let cut = idx.partition_point(|&v| v < low);
        if cut == 0 {
            retained.push_front(head);
            break;
        }
        let (old, keep) = head.split_at(cut);
        evicted.push(old);
        if !keep.is_empty() {
            retained.push_front(keep);
            break;
        }
    }
    trace!(
        max_index = mx,
        lower_bound = low,
        evicted = evicted.len(),
        "value-range window diff"
    );
    Ok((retained, evicted))
}
