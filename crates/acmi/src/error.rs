use thiserror::Error;

/// Reasons a telemetry line cannot be turned into an entity update.
///
/// None of these are fatal to a batch; callers log and skip the line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record has no id separator: {0:?}")]
    MissingId(String),

    #[error("record id is empty after sanitising")]
    EmptyId,

    #[error("timestamp marker {0:?} is not an entity record")]
    TimestampMarker(String),
}
