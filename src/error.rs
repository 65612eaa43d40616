//! Error types for trace processing and result output.
//!
//! Only conditions that stop a stage are errors here. Legs that cannot be
//! resolved (unknown waypoint, no walkable path, search timeout) are reported
//! as [`LegStatus`](crate::LegStatus) values instead.

use thiserror::Error;

/// A trace record could not be turned into a route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A field is neither the header token nor an integer after quote stripping.
    #[error("malformed token {token:?} in field {field}")]
    MalformedToken {
        /// Zero-based field index within the record
        field: usize,
        /// The raw field text
        token: String,
    },

    /// The record bytes are not valid UTF-8.
    #[error("record is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidEncoding { valid_up_to: usize },
}

/// Failure of a whole aggregation run.
#[derive(Error, Debug)]
pub enum TraceError {
    /// A record failed to parse under [`FailurePolicy::FailFast`](crate::FailurePolicy::FailFast).
    #[error("line {line}: {source}")]
    Parse {
        /// One-based line number of the record
        line: usize,
        #[source]
        source: ParseError,
    },

    #[error("failed to read trace input: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure writing results to a sink.
///
/// Already computed results are untouched, so the write can be retried.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode results: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "serde")]
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A navigation graph definition is inconsistent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("edge {edge} references node {node}, but the graph has {node_count} nodes")]
    EdgeOutOfRange {
        edge: usize,
        node: usize,
        node_count: usize,
    },

    #[error("node {node} has a non-finite coordinate")]
    InvalidNode { node: usize },
}
