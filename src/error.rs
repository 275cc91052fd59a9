//! Error kinds shared by every kernel in the crate.
//!
//! The four variants mirror the error taxonomy a caller needs to distinguish:
//! allocation failure, malformed input, an internal geometric inconsistency
//! (a bug or catastrophic numerical failure), and file I/O failure at the
//! CLI boundary.

/// The error type returned by every fallible public operation in this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A container failed to grow (e.g. capacity would exceed `u32::MAX`).
    #[error("allocation failed")]
    AllocationFailed,

    /// Malformed or out-of-contract input: wrong floats-per-vertex, wrong
    /// primitive kind, out-of-range index, malformed file token, odd-degree
    /// vertex during triangulation, too few unique points for a hull, or
    /// all-colinear/all-coplanar hull input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal invariant was violated: horizon-walk recovery failed,
    /// a neighbor lookup across an edge failed, triangulation left an open
    /// cusp, or a ray walk revisited a face. Non-recoverable for the
    /// current call.
    #[error("geometry inconsistent: {0}")]
    GeometryInconsistent(String),

    /// File open/read/write failure at the CLI/IO boundary.
    #[error("file error: {0}")]
    FileError(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::FileError(e.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(e: std::num::ParseFloatError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
