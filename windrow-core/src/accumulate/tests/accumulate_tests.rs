use approx::assert_relative_eq;

use super::*;
use crate::aggregate::{Count, Full, GroupedSum, Grouping, Mean, Sum, Var};

fn chunk(values: &[f64]) -> Chunk {
    Chunk::of("x", values.to_vec()).unwrap()
}

fn indexed(values: &[f64], index: &[i64]) -> Chunk {
    Chunk::of("x", values.to_vec())
        .unwrap()
        .with_index(index.to_vec())
        .unwrap()
}

fn scalar(value: &AggValue) -> f64 {
    value.scalar().expect("expected a one-column series")
}

// ── Expanding ─────────────────────────────────────────────────────────────

#[test]
fn test_expanding_mean_since_start() {
    let driver = Expanding::new(Mean);
    let (state, value) = driver.step(None, &chunk(&[2.0, 4.0])).unwrap();
    assert_eq!(scalar(&value), 3.0);
    let (_, value) = driver.step(Some(state), &chunk(&[6.0])).unwrap();
    assert_eq!(scalar(&value), 4.0);
}

#[test]
fn test_expanding_matches_batch_over_concatenation() {
    let driver = Expanding::new(Var::new());
    let chunks = [
        chunk(&[1.0, 2.0]),
        chunk(&[3.0, 4.0, 5.0]),
        chunk(&[]),
        chunk(&[6.0]),
    ];

    let mut state = None;
    let mut last = None;
    let mut all = chunks[0].empty_like();
    for c in &chunks {
        let (next, value) = driver.step(state.take(), c).unwrap();
        state = Some(next);
        last = Some(value);
        all = all.append(c).unwrap();
    }

    let batch = Var::new().stateless(&all).unwrap();
    assert_relative_eq!(
        scalar(&last.unwrap()),
        scalar(&batch),
        max_relative = 1e-12
    );
}

// ── Windowed, row-count ───────────────────────────────────────────────────

#[test]
fn test_windowed_sum_over_two_rows() {
    // Chunks [1,2], [3], [4] with a two-row window: 3, then 5, then 7.
    let driver = Windowed::new(Sum, WindowSpec::RowCount(2)).unwrap();
    let (state, value) = driver.step(None, &chunk(&[1.0, 2.0])).unwrap();
    assert_eq!(scalar(&value), 3.0);
    let (state, value) = driver.step(Some(state), &chunk(&[3.0])).unwrap();
    assert_eq!(scalar(&value), 5.0);
    let (state, value) = driver.step(Some(state), &chunk(&[4.0])).unwrap();
    assert_eq!(scalar(&value), 7.0);
    assert_eq!(state.retained_rows(), 2);
}

#[test]
fn test_window_never_exceeds_its_row_budget() {
    let driver = Windowed::new(Count, WindowSpec::RowCount(4)).unwrap();
    let deliveries = [1usize, 3, 2, 5, 1, 0, 2];

    let mut state = None;
    let mut seen = 0usize;
    for n in deliveries {
        let c = chunk(&vec![1.0; n]);
        let (next, value) = driver.step(state.take(), &c).unwrap();
        seen += n;
        let expected = seen.min(4);
        assert_eq!(next.retained_rows(), expected);
        assert_eq!(value.scalar_count(), Some(expected as i64));
        state = Some(next);
    }
}

#[test]
fn test_windowed_full_holds_exactly_the_window() {
    let driver = Windowed::new(Full, WindowSpec::RowCount(2)).unwrap();
    let (state, _) = driver.step(None, &chunk(&[1.0, 2.0])).unwrap();
    let (_, value) = driver.step(Some(state), &chunk(&[3.0])).unwrap();
    let frame = value.as_frame().unwrap();
    assert_eq!(frame.column("x"), Some(&[2.0, 3.0][..]));
}

#[test]
fn test_empty_step_reports_the_standing_result() {
    let driver = Windowed::new(Sum, WindowSpec::RowCount(2)).unwrap();
    let (state, _) = driver.step(None, &chunk(&[1.0, 2.0])).unwrap();
    let (state, value) = driver.step(Some(state), &chunk(&[])).unwrap();
    assert_eq!(scalar(&value), 3.0);
    assert_eq!(state.retained_rows(), 2);
}

// ── Windowed, value-range ─────────────────────────────────────────────────

#[test]
fn test_value_range_window_retains_the_boundary_row() {
    let driver = Windowed::new(Sum, WindowSpec::ValueRange(5)).unwrap();
    let (state, value) = driver.step(None, &indexed(&[1.0], &[0])).unwrap();
    assert_eq!(scalar(&value), 1.0);
    let (state, value) = driver.step(Some(state), &indexed(&[2.0], &[5])).unwrap();
    assert_eq!(scalar(&value), 3.0);
    // Max index becomes 10; the row at index 0 leaves, the row at exactly
    // 10 - 5 = 5 stays.
    let (state, value) = driver.step(Some(state), &indexed(&[4.0], &[10])).unwrap();
    assert_eq!(scalar(&value), 6.0);
    assert_eq!(state.retained_rows(), 2);
    let kept: Vec<i64> = state
        .retained()
        .flat_map(|c| c.index().unwrap().to_vec())
        .collect();
    assert_eq!(kept, vec![5, 10]);
}

#[test]
fn test_value_range_window_rejects_out_of_order_arrival() {
    let driver = Windowed::new(Sum, WindowSpec::ValueRange(5)).unwrap();
    let (state, _) = driver.step(None, &indexed(&[1.0], &[10])).unwrap();
    let err = driver
        .step(Some(state), &indexed(&[2.0], &[7]))
        .unwrap_err();
    assert_eq!(err, Error::IndexRegression { prev: 10, next: 7 });
}

// ── Configuration ─────────────────────────────────────────────────────────

#[test]
fn test_windowed_rejects_unbounded_and_zero_widths() {
    assert_eq!(
        Windowed::new(Sum, WindowSpec::Unbounded).unwrap_err(),
        Error::UnboundedWindow
    );
    assert_eq!(
        Windowed::new(Sum, WindowSpec::RowCount(0)).unwrap_err(),
        Error::InvalidWindowWidth(0)
    );
    assert_eq!(
        Windowed::new(Sum, WindowSpec::ValueRange(-1)).unwrap_err(),
        Error::InvalidWindowWidth(-1)
    );
}

// ── Grouped ───────────────────────────────────────────────────────────────

#[test]
fn test_grouped_driver_accumulates_per_key() {
    let driver = Grouped::new(GroupedSum::new(Grouping::by_column("k")));
    let c1 = Chunk::from_columns(vec![("k", vec![1.0, 2.0]), ("v", vec![10.0, 20.0])]).unwrap();
    let c2 = Chunk::from_columns(vec![("k", vec![1.0]), ("v", vec![5.0])]).unwrap();

    let (state, _) = driver.step(None, &c1, None).unwrap();
    let (_, value) = driver.step(Some(state), &c2, None).unwrap();
    let table = value.as_grouped().unwrap();
    assert_eq!(table.get("1"), Some(&[15.0][..]));
    assert_eq!(table.get("2"), Some(&[20.0][..]));
}

#[test]
fn test_grouped_driver_explicit_keys_override_bound_source() {
    let driver = Grouped::new(GroupedSum::new(Grouping::by_column("k")));
    let c = Chunk::from_columns(vec![("k", vec![1.0]), ("v", vec![7.0])]).unwrap();
    let explicit: Vec<GroupKey> = vec!["forced".to_string()];

    let (_, value) = driver.step_with(None, &c, Some(&explicit), None).unwrap();
    let table = value.as_grouped().unwrap();
    assert_eq!(table.get("forced"), Some(&[7.0][..]));
    assert_eq!(table.get("1"), None);
}

#[test]
fn test_grouped_driver_requires_some_key_source() {
    let driver = Grouped::new(GroupedSum::new(Grouping::paired()));
    let c = Chunk::of("v", vec![1.0]).unwrap();
    let err = driver.step(None, &c, None).unwrap_err();
    assert_eq!(err, Error::MissingGrouper);
    assert!(err.is_config());
}

#[test]
fn test_grouped_driver_uses_paired_keys_as_fallback() {
    let driver = Grouped::new(GroupedSum::new(Grouping::paired()));
    let c = Chunk::of("v", vec![1.0, 2.0]).unwrap();
    let paired: Vec<GroupKey> = vec!["a".to_string(), "b".to_string()];
    let (_, value) = driver.step(None, &c, Some(&paired)).unwrap();
    let table = value.as_grouped().unwrap();
    assert_eq!(table.get("a"), Some(&[1.0][..]));
    assert_eq!(table.get("b"), Some(&[2.0][..]));
}
