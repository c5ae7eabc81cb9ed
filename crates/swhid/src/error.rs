use thiserror::Error;

/// Failure modes when parsing a SWHID, matching §4.1: bad version, unknown
/// kind, or a hash that isn't exactly 40 lowercase hex digits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwhidError {
    /// The input isn't shaped like `swh:<version>:<kind>:<hash>` at all.
    #[error("malformed SWHID: {0:?}")]
    Malformed(String),

    /// The version component isn't `1`.
    #[error("unsupported SWHID version: {0:?}")]
    UnsupportedVersion(String),

    /// The kind component isn't one of `cnt`, `dir`, `ori`, `rel`, `rev`, `snp`.
    #[error("invalid SWHID kind: {0:?}")]
    InvalidKind(String),

    /// The hash component isn't exactly 40 lowercase hex characters.
    #[error("invalid SWHID hash: {0:?}")]
    InvalidHash(String),
}
