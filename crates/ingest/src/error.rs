use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Shutdown was signalled while a chunk was in flight. Nothing from the
    /// chunk was applied to the table.
    #[error("ingestion cancelled; in-flight chunk discarded")]
    Cancelled,
    #[error("pipeline has been shut down")]
    Closed,
}
