//! Errors surfaced by the fetch/verify engine (spec §7).

use thiserror::Error;

/// Result type alias used throughout `mafc-client`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a [`crate::channel::MaFileChannel`] read, write, or open can
/// fail with. Chunk-level errors attach to the chunk's shared future, so
/// every subscriber of that chunk observes the same variant (spec §7's
/// propagation policy).
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// `.mref`/`.mrkl` parsing or shape/root disagreement. Fatal.
    #[error(transparent)]
    Core(#[from] mafc_core::Error),

    /// A caller-supplied position or length fell outside `[0, content_size)`.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// `.mrkl` is held by another `MaFileChannel`.
    #[error("cache state file is locked by another process: {0}")]
    Locked(String),

    /// A fetched chunk's length disagreed with its expected boundary length.
    #[error("chunk {index}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        index: u64,
        expected: u64,
        actual: u64,
    },

    /// A fetched chunk's SHA-256 digest disagreed with the reference leaf
    /// hash. Not retried: the bytes arrived intact and disagree with the
    /// reference, so the source — not the transport — is wrong.
    #[error("chunk {index} failed hash verification against the reference")]
    HashMismatch { index: u64 },

    /// All retry attempts for a chunk's range request were exhausted.
    #[error("chunk {index} fetch failed after {attempts} attempts: {source}")]
    FetchFailed {
        index: u64,
        attempts: u32,
        source: TransportError,
    },

    /// The channel (or an individual read/write) was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Local cache/state durability failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Errors a [`crate::fetch::RangeClient`] implementation can raise.
/// Distinguishes transient conditions (worth retrying) from terminal ones.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// Timeout, connection reset, or 5xx — retried with backoff.
    #[error("transient transport error: {0}")]
    Transient(String),

    /// 4xx other than 429, or any other non-recoverable transport failure.
    #[error("terminal transport error: {0}")]
    Terminal(String),

    /// The server returned fewer bytes than the requested range; treated
    /// as transient (spec §4.7's partial-response handling).
    #[error("partial response: requested {requested} bytes, got {got}")]
    Partial { requested: u64, got: u64 },
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_) | TransportError::Partial { .. })
    }
}
