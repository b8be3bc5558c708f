use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong inside the engine.
///
/// Errors split into two families: configuration errors, raised when an
/// orchestrator or operator is built, and schema errors, raised at step time
/// when a chunk disagrees with the shape the accumulator has established.
/// Mathematically undefined divisions (empty window, `n <= ddof`) are *not*
/// errors; they yield `NaN` results like the rest of the numeric stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Window width must be strictly positive.
    #[error("window width must be positive, got {0}")]
    InvalidWindowWidth(i64),

    /// A windowed accumulator was configured with an unbounded window.
    #[error("windowed accumulation requires a bounded window")]
    UnboundedWindow,

    /// A grouped operator had no bound key source and no keys were supplied
    /// with the chunk.
    #[error("no grouper bound to the operator and none supplied with the chunk")]
    MissingGrouper,

    /// The chunk's column list disagrees with the accumulator's shape.
    #[error("column mismatch: accumulator tracks {expected:?}, chunk has {found:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Columns of a single chunk have differing lengths.
    #[error("ragged chunk: column `{column}` has {len} rows, expected {rows}")]
    RaggedChunk {
        column: String,
        len: usize,
        rows: usize,
    },

    /// The index sequence does not line up with the chunk's rows.
    #[error("index length {len} does not match row count {rows}")]
    IndexLength { len: usize, rows: usize },

    /// Indexed and unindexed chunks cannot be concatenated.
    #[error("cannot concatenate indexed and unindexed chunks")]
    MixedIndex,

    /// The resolved grouper does not align one-to-one with the chunk's rows.
    #[error("grouper yields {keys} keys for a chunk of {rows} rows")]
    KeyCountMismatch { keys: usize, rows: usize },

    /// A bound grouping column is absent from the chunk.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    /// A value-range window received a chunk without an index.
    #[error("value-range windows require indexed chunks")]
    MissingIndex,

    /// A value-range window saw an index go backwards.  Out-of-order arrival
    /// is a precondition violation and is rejected, never silently clamped.
    #[error("chunk index regresses: {next} arrived after {prev}")]
    IndexRegression { prev: i64, next: i64 },
}

impl Error {
    /// True for errors that indicate invalid construction-time configuration
    /// rather than a bad chunk.  Configuration errors are fatal and must not
    /// be retried.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidWindowWidth(_)
                | Error::UnboundedWindow
                | Error::MissingGrouper
                | Error::UnknownColumn(_)
        )
    }
}
