//! A [`crate::GraphBackend`] talking to the archive's public HTTP Web API.
//!
//! Simpler to deploy than the compressed-graph RPC backend, at the cost of
//! higher per-request latency — directly mirroring the tradeoff the
//! original `swh/fuse/backends/web_api.py` documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use swhid::{Kind, Swhid};

use crate::error::BackendError;
use crate::model::{
    Branch, BranchTarget, BranchTargetType, ContentMeta, ContentStatus, DirEntry, DirEntryType,
    MaybeText, Metadata, MetadataBody, ReleaseMeta, RevisionMeta, Visit,
};
use crate::{require_kind, GraphBackend};

/// Queries the Software Heritage Web API for metadata, history, and visits.
pub struct WebApiGraphBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl WebApiGraphBackend {
    /// `base_url` is the API root, e.g. `https://archive.softwareheritage.org/api/1`.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token,
        }
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json(&self, url: String) -> Result<Value, BackendError> {
        let resp = self.request(url).send().await?;
        let resp = resp.error_for_status()?;
        Ok(resp.json::<Value>().await?)
    }

    fn hex_swhid(kind: Kind, hex: &str) -> Result<Swhid, BackendError> {
        format!("swh:1:{}:{}", kind.tag(), hex)
            .parse()
            .map_err(|e| BackendError::Decode(format!("{e}")))
    }

    fn maybe_text(value: &Value) -> MaybeText {
        match value {
            Value::String(s) => MaybeText::Text(s.clone()),
            Value::Object(map) => match map.get("base64") {
                Some(Value::String(b64)) => MaybeText::Base64 { base64: b64.clone() },
                _ => MaybeText::Text(String::new()),
            },
            _ => MaybeText::Text(String::new()),
        }
    }

    fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
        value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
    }

    fn content_metadata(swhid: Swhid, raw: Value) -> Result<Metadata, BackendError> {
        let length = raw
            .get("length")
            .and_then(Value::as_u64)
            .ok_or_else(|| BackendError::Decode("missing content length".into()))?;
        let status = match raw.get("status").and_then(Value::as_str) {
            Some("skipped") => ContentStatus::Skipped,
            _ => ContentStatus::Visible,
        };
        Ok(Metadata {
            swhid,
            body: MetadataBody::Content(ContentMeta { length, status }),
            raw,
        })
    }

    fn directory_metadata(swhid: Swhid, raw: Value) -> Result<Metadata, BackendError> {
        let entries = raw
            .as_array()
            .ok_or_else(|| BackendError::Decode("directory listing is not an array".into()))?;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| BackendError::Decode("directory entry missing name".into()))?
                .as_bytes()
                .to_vec();
            let entry_type = match entry.get("type").and_then(Value::as_str) {
                Some("file") => DirEntryType::File,
                Some("dir") => DirEntryType::Dir,
                Some("rev") => DirEntryType::Rev,
                other => {
                    return Err(BackendError::Decode(format!(
                        "unknown directory entry type: {other:?}"
                    )))
                }
            };
            let target_kind = match entry_type {
                DirEntryType::File => Kind::Content,
                DirEntryType::Dir => Kind::Directory,
                DirEntryType::Rev => Kind::Revision,
            };
            let target_hex = entry
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| BackendError::Decode("directory entry missing target".into()))?;
            let target = Self::hex_swhid(target_kind, target_hex)?;
            let perms = entry
                .get("perms")
                .and_then(Value::as_u64)
                .ok_or_else(|| BackendError::Decode("directory entry missing perms".into()))?
                as u32;
            let length = entry.get("length").and_then(Value::as_u64);
            let status = match entry.get("status").and_then(Value::as_str) {
                Some("skipped") => Some(ContentStatus::Skipped),
                Some("visible") => Some(ContentStatus::Visible),
                _ => None,
            };
            out.push(DirEntry {
                name,
                entry_type,
                target,
                perms,
                length,
                status,
            });
        }
        Ok(Metadata {
            swhid,
            body: MetadataBody::Directory(out),
            raw,
        })
    }

    fn revision_metadata(swhid: Swhid, raw: Value) -> Result<Metadata, BackendError> {
        let directory_hex = raw
            .get("directory")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Decode("revision missing directory".into()))?;
        let directory = Self::hex_swhid(Kind::Directory, directory_hex)?;
        let mut parents = Vec::new();
        if let Some(arr) = raw.get("parents").and_then(Value::as_array) {
            for parent in arr {
                let id = parent
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| BackendError::Decode("revision parent missing id".into()))?;
                parents.push(Self::hex_swhid(Kind::Revision, id)?);
            }
        }
        let body = RevisionMeta {
            id: swhid,
            directory,
            parents,
            author: raw.get("author").map(Self::maybe_text).unwrap_or(MaybeText::Text(String::new())),
            committer: raw
                .get("committer")
                .map(Self::maybe_text)
                .unwrap_or(MaybeText::Text(String::new())),
            message: raw
                .get("message")
                .map(Self::maybe_text)
                .unwrap_or(MaybeText::Text(String::new())),
            date: raw.get("date").and_then(Self::parse_date),
            committer_date: raw.get("committer_date").and_then(Self::parse_date),
        };
        Ok(Metadata {
            swhid,
            body: MetadataBody::Revision(body),
            raw,
        })
    }

    fn release_metadata(swhid: Swhid, raw: Value) -> Result<Metadata, BackendError> {
        let target_type = match raw.get("target_type").and_then(Value::as_str) {
            Some("content") => Kind::Content,
            Some("directory") => Kind::Directory,
            Some("revision") => Kind::Revision,
            Some("release") => Kind::Release,
            other => {
                return Err(BackendError::Decode(format!(
                    "unknown release target type: {other:?}"
                )))
            }
        };
        let target_hex = raw
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Decode("release missing target".into()))?;
        let target = Self::hex_swhid(target_type, target_hex)?;
        let body = ReleaseMeta {
            id: swhid,
            target,
            target_type,
            name: raw
                .get("name")
                .map(Self::maybe_text)
                .unwrap_or(MaybeText::Text(String::new())),
            message: raw.get("message").filter(|v| !v.is_null()).map(Self::maybe_text),
            author: raw.get("author").filter(|v| !v.is_null()).map(Self::maybe_text),
            date: raw.get("date").and_then(Self::parse_date),
        };
        Ok(Metadata {
            swhid,
            body: MetadataBody::Release(body),
            raw,
        })
    }

    fn snapshot_metadata(swhid: Swhid, raw: Value) -> Result<Metadata, BackendError> {
        let branches = raw
            .get("branches")
            .and_then(Value::as_object)
            .ok_or_else(|| BackendError::Decode("snapshot missing branches".into()))?;
        let mut out = Vec::with_capacity(branches.len());
        for (name, branch) in branches {
            let target_type = match branch.get("target_type").and_then(Value::as_str) {
                Some("content") => BranchTargetType::Content,
                Some("directory") => BranchTargetType::Directory,
                Some("revision") => BranchTargetType::Revision,
                Some("release") => BranchTargetType::Release,
                Some("snapshot") => BranchTargetType::Snapshot,
                Some("alias") => BranchTargetType::Alias,
                other => {
                    return Err(BackendError::Decode(format!(
                        "unknown branch target type: {other:?}"
                    )))
                }
            };
            let target_raw = branch
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| BackendError::Decode("branch missing target".into()))?;
            let target = if target_type == BranchTargetType::Alias {
                BranchTarget::Alias(target_raw.as_bytes().to_vec())
            } else {
                let kind = match target_type {
                    BranchTargetType::Content => Kind::Content,
                    BranchTargetType::Directory => Kind::Directory,
                    BranchTargetType::Revision => Kind::Revision,
                    BranchTargetType::Release => Kind::Release,
                    BranchTargetType::Snapshot => Kind::Snapshot,
                    BranchTargetType::Alias => unreachable!(),
                };
                BranchTarget::Swhid(Self::hex_swhid(kind, target_raw)?)
            };
            out.push((name.as_bytes().to_vec(), Branch { target, target_type }));
        }
        Ok(Metadata {
            swhid,
            body: MetadataBody::Snapshot(out),
            raw,
        })
    }
}

#[async_trait]
impl GraphBackend for WebApiGraphBackend {
    async fn get_metadata(&self, swhid: Swhid) -> Result<Metadata, BackendError> {
        log::debug!("fetching metadata via web API for {swhid}");
        let hex = swhid.hash_hex();
        let url = match swhid.kind() {
            Kind::Content => format!("{}/content/sha1_git:{}/", self.base_url, hex),
            Kind::Directory => format!("{}/directory/{}/", self.base_url, hex),
            Kind::Revision => format!("{}/revision/{}/", self.base_url, hex),
            Kind::Release => format!("{}/release/{}/", self.base_url, hex),
            Kind::Snapshot => format!("{}/snapshot/{}/", self.base_url, hex),
            Kind::Origin => {
                return Err(BackendError::InvalidRequest(
                    "origins have no get_metadata shape; use get_visits".into(),
                ))
            }
        };
        let raw = self.get_json(url).await?;
        match swhid.kind() {
            Kind::Content => Self::content_metadata(swhid, raw),
            Kind::Directory => Self::directory_metadata(swhid, raw),
            Kind::Revision => Self::revision_metadata(swhid, raw),
            Kind::Release => Self::release_metadata(swhid, raw),
            Kind::Snapshot => Self::snapshot_metadata(swhid, raw),
            Kind::Origin => unreachable!(),
        }
    }

    async fn get_history(&self, rev: Swhid) -> Result<Vec<(Swhid, Swhid)>, BackendError> {
        require_kind(rev, Kind::Revision)?;
        log::debug!("retrieving history of {rev} via graph API");
        let url = format!("{}/graph/visit/edges/{}?edges=rev:rev", self.base_url, rev);
        let resp = match self.request(url).send().await {
            Ok(r) => r,
            Err(err) => {
                // The graph API may lag behind the freshest archive content; the
                // original implementation tolerates this by returning no history
                // rather than failing the whole listing.
                log::warn!("cannot fetch history for {rev}: {err}");
                return Ok(Vec::new());
            }
        };
        let resp = match resp.error_for_status() {
            Ok(r) => r,
            Err(err) => {
                log::warn!("cannot fetch history for {rev}: {err}");
                return Ok(Vec::new());
            }
        };
        let text = resp.text().await?;
        let mut edges = Vec::new();
        for line in text.trim().lines() {
            let mut parts = line.split(' ');
            let (Some(src), Some(dst)) = (parts.next(), parts.next()) else {
                continue;
            };
            let src: Swhid = src.parse().map_err(|e| BackendError::Decode(format!("{e}")))?;
            let dst: Swhid = dst.parse().map_err(|e| BackendError::Decode(format!("{e}")))?;
            edges.push((src, dst));
        }
        Ok(edges)
    }

    async fn get_visits(&self, url_percent_encoded: &str) -> Result<Vec<Visit>, BackendError> {
        log::debug!("retrieving visits for origin '{url_percent_encoded}' via web API");
        let url = percent_decode_str(url_percent_encoded)
            .decode_utf8()
            .map_err(|e| BackendError::Decode(e.to_string()))?
            .into_owned();
        let endpoint = format!(
            "{}/origin/{}/visits/",
            self.base_url,
            percent_encoding::utf8_percent_encode(&url, percent_encoding::NON_ALPHANUMERIC)
        );
        let raw = self.get_json(endpoint).await?;
        let items = raw
            .as_array()
            .ok_or_else(|| BackendError::Decode("visits response is not an array".into()))?;
        let mut visits = Vec::with_capacity(items.len());
        for item in items {
            let date = item
                .get("date")
                .and_then(WebApiGraphBackend::parse_date)
                .ok_or_else(|| BackendError::Decode("visit missing date".into()))?;
            let origin = item
                .get("origin")
                .and_then(Value::as_str)
                .unwrap_or(&url)
                .to_owned();
            let snapshot = match item.get("snapshot").and_then(Value::as_str) {
                Some(hex) => Some(Self::hex_swhid(Kind::Snapshot, hex)?),
                None => None,
            };
            visits.push(Visit { date, origin, snapshot });
        }
        Ok(visits)
    }
}
