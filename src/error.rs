use thiserror::Error;

/// Errors surfaced by the codec, the append-only file and the session layer.
///
/// Arity mismatches and missing keys are not errors at this level; the
/// command handlers report those directly as RESP error frames.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed frame on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket or file I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Command name not present in the dispatch table.
    #[error("invalid command: {0}")]
    UnknownCommand(String),

    /// DELETE asked the append-only file to splice a key it never indexed.
    #[error("missed offset")]
    MissingOffset,

    /// The consensus collaborator rejected or timed out on an entry.
    #[error("replication error: {0}")]
    Replication(String),
}

pub type Result<T> = std::result::Result<T, Error>;
