use thiserror::Error;

/// Cache-layer failure modes (§7's `CacheError`). These are wrapped in
/// `anyhow::Error` at the public API boundary; this type exists so callers
/// that care can match on `retryable()`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying SQLite connection reported an error.
    #[error("cache storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A cached JSON blob failed to deserialize back into the expected
    /// shape; the cache row is corrupt or was written by an incompatible
    /// version.
    #[error("corrupt cache entry for {swhid}: {source}")]
    Corrupt {
        swhid: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// §7: `CacheError` "may retry once if due to transient locking".
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            CacheError::Storage(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
        )
    }
}
