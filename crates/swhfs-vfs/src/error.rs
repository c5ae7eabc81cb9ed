//! The error kinds the filesystem surface exposes (§7), and the mapping
//! from internal failures (`BackendError`, `CacheError`, parse failures)
//! down to the POSIX errno values `fuser` hands back to the kernel.

use swhfs_backend::BackendError;

/// What a `swhfs-vfs` operation failed with, before it's translated to an
/// errno at the `fuser::Filesystem` boundary (§7).
#[derive(Debug, thiserror::Error)]
pub enum FuseError {
    /// Unknown name, missing inode, missing metadata — the most common
    /// failure (§7).
    #[error("not found")]
    NotFound,
    /// Wrong SWHID kind for the operation (`get_blob` on a non-`cnt`,
    /// `get_history` on a non-`rev`, §4.5).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// An xattr this entry doesn't recognise (§6).
    #[error("unsupported")]
    Unsupported,
}

impl FuseError {
    /// The errno `fuser` should hand back to the kernel.
    pub fn errno(&self) -> libc::c_int {
        match self {
            FuseError::NotFound => libc::ENOENT,
            FuseError::InvalidRequest(_) => libc::EINVAL,
            FuseError::Unsupported => libc::ENOSYS,
        }
    }
}

impl From<BackendError> for FuseError {
    /// §7: "`BackendError` (remote failure) — logged, converted to
    /// ENOENT", except `InvalidRequest`, which keeps its EINVAL shape.
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidRequest(msg) => FuseError::InvalidRequest(msg),
            other => {
                log::warn!("backend error downgraded to ENOENT: {other}");
                FuseError::NotFound
            }
        }
    }
}

impl From<swhid::SwhidError> for FuseError {
    /// §7: "`ParseError` — treated as NotFound for the purpose of lookup."
    fn from(err: swhid::SwhidError) -> Self {
        log::debug!("swhid parse error treated as lookup miss: {err}");
        FuseError::NotFound
    }
}

impl From<anyhow::Error> for FuseError {
    /// Cache-layer failures (§7: "`CacheError` — logged, may retry once
    /// if due to transient locking"). We don't retry here — `CacheError`
    /// retry, where it matters, happens inside `swhfs-cache` itself — but
    /// we do log before downgrading to ENOENT so corruption isn't silent.
    fn from(err: anyhow::Error) -> Self {
        log::error!("cache error downgraded to ENOENT: {err:#}");
        FuseError::NotFound
    }
}
