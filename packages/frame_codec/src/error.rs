/// Errors raised while building a frame or converting it from the wire.
///
/// A single failing row fails the whole conversion: callers never see a
/// partially decoded frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("timestamp {0:?} is out of range")]
    TimestampOutOfRange(String),

    #[error("row {timestamp:?} is not an object")]
    NotARecord { timestamp: String },

    #[error("row {timestamp:?} has columns {found:?}, expected {expected:?}")]
    InconsistentColumns {
        timestamp: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row has {found} values for {expected} columns")]
    RowLength { expected: usize, found: usize },

    #[error("stream data must be an object keyed by timestamp")]
    NotAnObject,
}
