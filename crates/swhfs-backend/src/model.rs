//! The uniform in-process representation that backend responses are
//! translated into before they ever reach the cache or the entry tree
//! (§4.2, §9 "Dynamic types"). Each concrete backend is responsible for
//! turning its wire format (JSON over HTTP, or the compressed-graph RPC
//! protocol) into these sum types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swhid::Swhid;

/// A string field that may not be valid UTF-8 in the archive (commit
/// messages and author names are raw bytes in git). Non-UTF-8 input is
/// rendered as base64 per §4.2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaybeText {
    /// The bytes decoded as UTF-8 text.
    Text(String),
    /// The raw bytes, base64-encoded, because they weren't valid UTF-8.
    Base64 { base64: String },
}

impl MaybeText {
    /// Build a [`MaybeText`] from raw bytes, preferring the UTF-8 form.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => MaybeText::Text(s.to_owned()),
            Err(_) => MaybeText::Base64 {
                base64: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes),
            },
        }
    }
}

/// `cnt` metadata: `{length, status}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMeta {
    pub length: u64,
    pub status: ContentStatus,
}

/// Visibility of a content object in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Visible,
    Skipped,
}

/// One entry of a `dir` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: Vec<u8>,
    #[serde(rename = "type")]
    pub entry_type: DirEntryType,
    pub target: Swhid,
    pub perms: u32,
    pub length: Option<u64>,
    pub status: Option<ContentStatus>,
}

/// The kind of object a directory entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirEntryType {
    File,
    Dir,
    Rev,
}

/// `rev` metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMeta {
    pub id: Swhid,
    pub directory: Swhid,
    pub parents: Vec<Swhid>,
    pub author: MaybeText,
    pub committer: MaybeText,
    pub message: MaybeText,
    pub date: Option<DateTime<Utc>>,
    pub committer_date: Option<DateTime<Utc>>,
}

/// `rel` metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMeta {
    pub id: Swhid,
    pub target: Swhid,
    pub target_type: swhid::Kind,
    pub name: MaybeText,
    pub message: Option<MaybeText>,
    pub author: Option<MaybeText>,
    pub date: Option<DateTime<Utc>>,
}

/// One branch of a `snp` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub target: BranchTarget,
    pub target_type: BranchTargetType,
}

/// A branch's target: either another branch name (alias) or an artifact
/// SWHID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchTarget {
    /// `target_type == alias`: the raw name of another branch in the same
    /// snapshot.
    Alias(Vec<u8>),
    /// Any other target type: the SWHID it resolves to.
    Swhid(Swhid),
}

/// The kind of a snapshot branch's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchTargetType {
    Content,
    Directory,
    Revision,
    Release,
    Snapshot,
    Alias,
}

/// A single recorded visit of an origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub date: DateTime<Utc>,
    pub origin: String,
    pub snapshot: Option<Swhid>,
}

/// The per-kind payload of [`Metadata`], matching §4.2's five
/// `get_metadata` response shapes (origins have no shape here: they're
/// resolved through [`Visit`] lists instead).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body")]
pub enum MetadataBody {
    Content(ContentMeta),
    Directory(Vec<DirEntry>),
    Revision(RevisionMeta),
    Release(ReleaseMeta),
    Snapshot(Vec<(Vec<u8>, Branch)>),
}

impl MetadataBody {
    /// The date used to compute the cache's `date_prefix` column: only
    /// revisions carry one (§4.3).
    pub fn date_prefix(&self) -> Option<String> {
        match self {
            MetadataBody::Revision(rev) => rev.date.map(|d| d.format("%Y/%m/%d/").to_string()),
            _ => None,
        }
    }
}

/// The cached/returned unit of archive metadata for one SWHID: the typed
/// body plus the exact backend payload (so `<SWHID>.json` can be rendered
/// byte-for-byte from what the archive actually returned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub swhid: Swhid,
    pub body: MetadataBody,
    pub raw: serde_json::Value,
}

impl Metadata {
    pub fn date_prefix(&self) -> Option<String> {
        self.body.date_prefix()
    }
}
