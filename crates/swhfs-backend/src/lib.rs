//! Capability interfaces the VFS core consumes to talk to the archive
//! (§4.2), plus the uniform metadata representation backends translate
//! their wire formats into before handing data to the cache layer.
//!
//! Two concrete [`GraphBackend`] implementations exist
//! ([`graph::CompressedGraphBackend`], [`graph::WebApiGraphBackend`]) and
//! two concrete [`ContentBackend`] implementations
//! ([`content::ObjStorageBackend`], [`content::WebApiContentBackend`]). The
//! core is agnostic to which pair is wired up; that choice is made once, at
//! startup, from configuration.

mod error;
mod model;

pub mod content;
pub mod graph;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use error::BackendError;
pub use model::{
    Branch, BranchTarget, BranchTargetType, ContentMeta, ContentStatus, DirEntry, DirEntryType,
    MaybeText, Metadata, MetadataBody, ReleaseMeta, RevisionMeta, Visit,
};

use async_trait::async_trait;
use swhid::Swhid;

/// Metadata, history, and visit lookups against the archive's graph.
///
/// All methods may suspend (§5): implementations typically perform an HTTP
/// or RPC round-trip and must not block the calling async task's executor
/// thread while doing so.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Fetch the metadata for any artifact SWHID. The shape of the result
    /// depends on `swhid.kind()` (§4.2).
    async fn get_metadata(&self, swhid: Swhid) -> Result<Metadata, BackendError>;

    /// Fetch every `(descendant, ancestor)` edge reachable from `rev` by
    /// following `rev -> parent` links, in reverse-topological edge order.
    /// The caller assembles these into a DAG; this method performs no
    /// traversal bookkeeping of its own.
    async fn get_history(&self, rev: Swhid) -> Result<Vec<(Swhid, Swhid)>, BackendError>;

    /// Fetch every recorded visit of a percent-encoded origin URL.
    async fn get_visits(&self, url_percent_encoded: &str) -> Result<Vec<Visit>, BackendError>;
}

/// Content blob retrieval against the archive's object storage.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Fetch the full bytes of a `cnt` SWHID. Fails with
    /// [`BackendError::NotFound`] if the object isn't present.
    async fn get_blob(&self, cnt: Swhid) -> Result<Vec<u8>, BackendError>;
}

/// Guard used by both concrete [`GraphBackend`]s: reject calls whose SWHID
/// kind doesn't make sense for the operation before doing any I/O.
pub(crate) fn require_kind(swhid: Swhid, kind: swhid::Kind) -> Result<(), BackendError> {
    if swhid.kind() == kind {
        Ok(())
    } else {
        Err(BackendError::InvalidRequest(format!(
            "expected a {kind} SWHID, got {swhid}"
        )))
    }
}
