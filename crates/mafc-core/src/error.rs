//! Error types shared by the Merkle shape, reference, and state layers.

use thiserror::Error;

/// Result type alias used throughout `mafc-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while computing chunk shape, loading a `.mref`/`.mrkl`
/// file, or verifying a chunk against the reference tree.
///
/// `Clone` so that [`mafc_client::Error`](../../mafc_client/enum.Error.html)
/// (which wraps this type) can stay `Clone` itself — chunk futures are
/// shared across subscribers and every subscriber needs its own copy of
/// whatever error resolved the future.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The `.mref` or `.mrkl` binary layout failed to parse (bad magic,
    /// unsupported version, truncated file, bad footer digest).
    #[error("format error: {0}")]
    Format(String),

    /// A persisted state file's root hash or shape disagrees with the
    /// reference it was opened against.
    #[error("mismatch: {0}")]
    Mismatch(String),

    /// A caller passed a position or chunk index outside the content's
    /// logical bounds.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// Underlying filesystem I/O failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
