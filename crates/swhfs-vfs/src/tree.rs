//! §4.4's behavioural contracts: `compute_entries`, `lookup`, the per-`Kind`
//! name-validating regex, and the directories exempt from `DirEntryCache`
//! because their contents track the live state of the on-disk caches.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use swhfs_backend::{BranchTarget, DirEntryType, MetadataBody};
use swhid::Swhid;

use crate::entry::{root_children, Entry, Kind, Mode, ShardPath};
use crate::error::FuseError;
use crate::fuse::Fuse;
use crate::shard;

const HISTORY_PAGE_SIZE: usize = 10_000;

/// §4.3 "Certain parent kinds... are exempt and never cached" in
/// `DirEntryCache`: the on-the-fly mounting directories and the
/// SWHID-sharded cache directories, since their contents track live cache
/// state rather than immutable archive state.
pub fn is_exempt(kind: &Kind) -> bool {
    matches!(
        kind,
        Kind::ArchiveDir | Kind::OriginDir | Kind::CacheDir | Kind::CacheShard { .. }
    )
}

/// The name-validation regex for a directory `Kind`, consulted by `lookup`
/// before it does any work (§4.4 "lookup rejects names not matching the
/// regex before calling into compute_entries"). `None` means any name is
/// accepted (the scan falls through to `compute_entries`).
pub fn name_regex(kind: &Kind) -> Option<&'static Regex> {
    static SWHID_OR_JSON: OnceLock<Regex> = OnceLock::new();
    static ORIGIN_URL: OnceLock<Regex> = OnceLock::new();
    static HEX2: OnceLock<Regex> = OnceLock::new();
    static HEX2_OR_ORIGIN: OnceLock<Regex> = OnceLock::new();
    static FULL_REV: OnceLock<Regex> = OnceLock::new();
    static PAGE: OnceLock<Regex> = OnceLock::new();
    static INDEX: OnceLock<Regex> = OnceLock::new();
    static YEAR_OR_STATUS: OnceLock<Regex> = OnceLock::new();
    static TWO_DIGITS: OnceLock<Regex> = OnceLock::new();
    static VISIT_DAY: OnceLock<Regex> = OnceLock::new();

    match kind {
        Kind::ArchiveDir | Kind::HistoryByHashShard { .. } | Kind::HistoryByPageShard { .. } => {
            Some(SWHID_OR_JSON.get_or_init(|| {
                Regex::new(r"^swh:1:(cnt|dir|rev|rel|snp):[0-9a-f]{40}(\.json)?$").unwrap()
            }))
        }
        Kind::OriginDir => Some(ORIGIN_URL.get_or_init(|| Regex::new(r"%3[Aa]").unwrap())),
        Kind::CacheDir => Some(HEX2_OR_ORIGIN.get_or_init(|| Regex::new(r"^([0-9a-f]{2}|origin)$").unwrap())),
        Kind::HistoryByHash { .. } => Some(HEX2.get_or_init(|| Regex::new(r"^[0-9a-f]{2}$").unwrap())),
        Kind::HistoryByPage { .. } => Some(PAGE.get_or_init(|| Regex::new(r"^\d{3,}$").unwrap())),
        Kind::RevisionParents { .. } => Some(INDEX.get_or_init(|| Regex::new(r"^[1-9]\d*$").unwrap())),
        Kind::HistoryByDate { .. } => {
            Some(YEAR_OR_STATUS.get_or_init(|| Regex::new(r"^(\d{4}|\.status)$").unwrap()))
        }
        Kind::HistoryByDateShard { shard, .. } if shard.prefix.len() < 3 => {
            Some(TWO_DIGITS.get_or_init(|| Regex::new(r"^\d{2}$").unwrap()))
        }
        Kind::HistoryByDateShard { .. } => Some(FULL_REV.get_or_init(|| {
            Regex::new(r"^swh:1:rev:[0-9a-f]{40}$").unwrap()
        })),
        Kind::Origin(_) => Some(VISIT_DAY.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())),
        _ => None,
    }
}

/// §4.4 `compute_entries`: the lazy child sequence of a directory entry.
/// Leaf kinds (files and symlinks) have none and error out.
pub async fn compute_entries(fuse: &Arc<Fuse>, entry: &Entry) -> Result<Vec<Entry>, FuseError> {
    let depth = entry.depth;
    match &entry.kind {
        Kind::RootDir => Ok(root_children()),
        Kind::ArchiveDir => Ok(Vec::new()),
        Kind::OriginDir => origin_dir_entries(fuse, depth).await,
        Kind::CacheDir => cache_dir_entries(fuse, depth).await,
        Kind::CacheShard { hex_prefix } => cache_shard_entries(fuse, depth, hex_prefix).await,
        Kind::Directory(swhid) => directory_entries(fuse, depth, *swhid).await,
        Kind::Revision(swhid) => revision_entries(fuse, depth, *swhid).await,
        Kind::RevisionParents { parents } => Ok(revision_parents_entries(depth, parents)),
        Kind::RevisionHistory(root) => revision_history_entries(fuse, depth, *root).await,
        Kind::HistoryByHash { root } => history_by_hash_entries(fuse, depth, *root).await,
        Kind::HistoryByHashShard { root, hex_prefix } => {
            history_by_hash_shard_entries(fuse, depth, *root, hex_prefix).await
        }
        Kind::HistoryByPage { root } => history_by_page_entries(fuse, depth, *root).await,
        Kind::HistoryByPageShard { root, page } => history_by_page_shard_entries(fuse, depth, *root, *page).await,
        Kind::HistoryByDate { root } => history_by_date_entries(fuse, depth, *root).await,
        Kind::HistoryByDateShard { root, shard } => history_by_date_shard_entries(fuse, depth, *root, shard).await,
        Kind::Release(swhid) => release_entries(fuse, depth, *swhid).await,
        Kind::Snapshot { swhid, shard } => snapshot_entries(fuse, depth, *swhid, shard).await,
        Kind::Origin(url) => origin_visits_entries(fuse, depth, url).await,
        Kind::OriginVisit { url, visit } => Ok(origin_visit_entries(fuse, depth, url, visit)),
        Kind::Readme
        | Kind::Content(_)
        | Kind::HistoryStatus { .. }
        | Kind::ReleaseType { .. }
        | Kind::MetaFile { .. }
        | Kind::MetadataEntry(_)
        | Kind::Symlink { .. } => Err(FuseError::InvalidRequest(format!("{} is not a directory", entry.name))),
    }
}

/// §4.4 `lookup`: the default scan over `compute_entries`, specialised for
/// the on-the-fly-mounting directories that can't be enumerated.
pub async fn lookup(fuse: &Arc<Fuse>, parent: &Entry, name: &str) -> Result<Option<Entry>, FuseError> {
    match &parent.kind {
        Kind::RootDir => Ok(root_children().into_iter().find(|e| e.name == name)),
        Kind::ArchiveDir => archive_lookup(fuse, parent.depth, name).await,
        Kind::OriginDir => origin_lookup(fuse, parent.depth, name).await,
        _ => {
            let children = compute_entries(fuse, parent).await?;
            Ok(children.into_iter().find(|e| e.name == name))
        }
    }
}

/// §4.4.4 `unlink`: the only writable operation, confined to cache shards.
pub async fn unlink(fuse: &Fuse, parent: &Entry, name: &str) -> Result<(), FuseError> {
    match &parent.kind {
        Kind::CacheShard { .. } => {
            let stem = name.strip_suffix(".json").unwrap_or(name);
            let swhid: Swhid = stem.parse()?;
            fuse.store().metadata().remove(swhid).await.map_err(FuseError::from)?;
            fuse.store().blob().remove(swhid).await.map_err(FuseError::from)?;
            Ok(())
        }
        _ => Err(FuseError::Unsupported),
    }
}

/// §4.4.2 `ArchiveDir::lookup`: `<SWHID>` or `<SWHID>.json`.
async fn archive_lookup(fuse: &Fuse, depth: u32, name: &str) -> Result<Option<Entry>, FuseError> {
    let child_depth = depth + 1;
    if let Some(stem) = name.strip_suffix(".json") {
        let swhid: Swhid = stem.parse()?;
        return Ok(Some(Entry::new(name, Mode::RoFile, child_depth, Kind::MetadataEntry(swhid))));
    }
    let swhid: Swhid = name.parse()?;
    let meta = fuse.get_metadata(swhid).await?;
    let kind = match meta.body {
        MetadataBody::Content(_) => Entry::new(name, Mode::RoFile, child_depth, Kind::Content(swhid)),
        MetadataBody::Directory(_) => Entry::new(name, Mode::RoDir, child_depth, Kind::Directory(swhid)),
        MetadataBody::Revision(_) => Entry::new(name, Mode::RoDir, child_depth, Kind::Revision(swhid)),
        MetadataBody::Release(_) => Entry::new(name, Mode::RoDir, child_depth, Kind::Release(swhid)),
        MetadataBody::Snapshot(_) => {
            Entry::new(name, Mode::RoDir, child_depth, Kind::Snapshot { swhid, shard: ShardPath { prefix: vec![] } })
        }
    };
    Ok(Some(kind))
}

/// §4.4.3 `OriginDir::lookup`: treat `name` as a percent-encoded URL,
/// forcing `get_visits` on a cache miss.
async fn origin_lookup(fuse: &Fuse, depth: u32, name: &str) -> Result<Option<Entry>, FuseError> {
    fuse.get_visits(name).await?;
    Ok(Some(Entry::new(name, Mode::RoDir, depth + 1, Kind::Origin(name.to_owned()))))
}

async fn origin_dir_entries(fuse: &Fuse, depth: u32) -> Result<Vec<Entry>, FuseError> {
    let urls = fuse.store().visits().cached_urls().await.map_err(FuseError::from)?;
    let child_depth = depth + 1;
    Ok(urls
        .into_iter()
        .map(|url| Entry::new(url.clone(), Mode::RoDir, child_depth, Kind::Origin(url)))
        .collect())
}

async fn cache_dir_entries(fuse: &Fuse, depth: u32) -> Result<Vec<Entry>, FuseError> {
    let swhids = fuse.store().metadata().cached_swhids().await.map_err(FuseError::from)?;
    let prefixes: BTreeSet<String> = swhids.iter().map(|s| s.hash_prefix(2)).collect();
    let child_depth = depth + 1;
    let mut out: Vec<Entry> = prefixes
        .into_iter()
        .map(|p| Entry::new(p.clone(), Mode::RwDir, child_depth, Kind::CacheShard { hex_prefix: p }))
        .collect();
    out.push(Entry::new("origin", Mode::RoSymlink, child_depth, Kind::Symlink { target: "../origin".to_owned() }));
    Ok(out)
}

async fn cache_shard_entries(fuse: &Fuse, depth: u32, hex_prefix: &str) -> Result<Vec<Entry>, FuseError> {
    let swhids = fuse.store().metadata().cached_swhids().await.map_err(FuseError::from)?;
    let child_depth = depth + 1;
    let mut out = Vec::new();
    for s in swhids.into_iter().filter(|s| s.hash_prefix(2) == hex_prefix) {
        let target = Entry::relative_archive_path(depth, s);
        out.push(Entry::new(s.to_string(), Mode::RoSymlink, child_depth, Kind::Symlink { target: target.clone() }));
        out.push(Entry::new(
            format!("{s}.json"),
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: format!("{target}.json") },
        ));
    }
    Ok(out)
}

async fn directory_entries(fuse: &Fuse, depth: u32, swhid: Swhid) -> Result<Vec<Entry>, FuseError> {
    let meta = fuse.get_metadata(swhid).await?;
    let MetadataBody::Directory(entries) = meta.body else {
        return Err(FuseError::InvalidRequest(format!("{swhid} is not a directory")));
    };
    let child_depth = depth + 1;
    let mut out = Vec::with_capacity(entries.len());
    for e in entries {
        let name = String::from_utf8_lossy(&e.name).into_owned();
        if e.perms == 0o120000 {
            let target = match fuse.get_blob(e.target).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    log::warn!("broken symlink {name} in {swhid}: {err}");
                    String::new()
                }
            };
            out.push(Entry::new(name, Mode::RoSymlink, child_depth, Kind::Symlink { target }));
            continue;
        }
        match e.entry_type {
            DirEntryType::Dir => {
                out.push(Entry::new(name, Mode::RoDir, child_depth, Kind::Directory(e.target)));
            }
            DirEntryType::Rev => {
                if let Err(err) = fuse.get_metadata(e.target).await {
                    log::debug!("submodule prefetch failed for {}: {err}", e.target);
                }
                let target = Entry::relative_archive_path(depth, e.target);
                out.push(Entry::new(name, Mode::RoSymlink, child_depth, Kind::Symlink { target }));
            }
            DirEntryType::File => {
                out.push(Entry::new(name, Mode::Archived(e.perms), child_depth, Kind::Content(e.target)));
            }
        }
    }
    Ok(out)
}

async fn revision_entries(fuse: &Fuse, depth: u32, swhid: Swhid) -> Result<Vec<Entry>, FuseError> {
    let meta = fuse.get_metadata(swhid).await?;
    let MetadataBody::Revision(rev) = meta.body else {
        return Err(FuseError::InvalidRequest(format!("{swhid} is not a revision")));
    };
    let child_depth = depth + 1;
    let mut out = vec![
        Entry::new(
            "root",
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: Entry::relative_archive_path(depth, rev.directory) },
        ),
        Entry::new("parents", Mode::RoDir, child_depth, Kind::RevisionParents { parents: rev.parents.clone() }),
        Entry::new("history", Mode::RoDir, child_depth, Kind::RevisionHistory(swhid)),
        Entry::new(
            "meta.json",
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: Entry::relative_metadata_path(depth, swhid) },
        ),
    ];
    if !rev.parents.is_empty() {
        out.push(Entry::new("parent", Mode::RoSymlink, child_depth, Kind::Symlink { target: "parents/1/".to_owned() }));
    }
    Ok(out)
}

fn revision_parents_entries(depth: u32, parents: &[Swhid]) -> Vec<Entry> {
    let child_depth = depth + 1;
    parents
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Entry::new(
                (i + 1).to_string(),
                Mode::RoSymlink,
                child_depth,
                Kind::Symlink { target: Entry::relative_archive_path(depth, *p) },
            )
        })
        .collect()
}

async fn revision_history_entries(fuse: &Arc<Fuse>, depth: u32, root: Swhid) -> Result<Vec<Entry>, FuseError> {
    fuse.get_history(root).await?;
    fuse.spawn_history_prefetch(root);
    let child_depth = depth + 1;
    Ok(vec![
        Entry::new("by-hash", Mode::RoDir, child_depth, Kind::HistoryByHash { root }),
        Entry::new("by-page", Mode::RoDir, child_depth, Kind::HistoryByPage { root }),
        Entry::new("by-date", Mode::RoDir, child_depth, Kind::HistoryByDate { root }),
    ])
}

async fn history_by_hash_entries(fuse: &Fuse, depth: u32, root: Swhid) -> Result<Vec<Entry>, FuseError> {
    let ancestors = fuse.store().history().ancestors(root).await.map_err(FuseError::from)?;
    let prefixes: BTreeSet<String> = ancestors.iter().map(|a| a.hash_prefix(2)).collect();
    let child_depth = depth + 1;
    Ok(prefixes
        .into_iter()
        .map(|p| Entry::new(p.clone(), Mode::RoDir, child_depth, Kind::HistoryByHashShard { root, hex_prefix: p }))
        .collect())
}

async fn history_by_hash_shard_entries(fuse: &Fuse, depth: u32, root: Swhid, hex_prefix: &str) -> Result<Vec<Entry>, FuseError> {
    let ancestors = fuse.store().history().ancestors(root).await.map_err(FuseError::from)?;
    let child_depth = depth + 1;
    Ok(ancestors
        .into_iter()
        .filter(|a| a.hash_prefix(2) == hex_prefix)
        .map(|a| {
            Entry::new(
                a.to_string(),
                Mode::RoSymlink,
                child_depth,
                Kind::Symlink { target: Entry::relative_archive_path(depth, a) },
            )
        })
        .collect())
}

async fn history_by_page_entries(fuse: &Fuse, depth: u32, root: Swhid) -> Result<Vec<Entry>, FuseError> {
    let ancestors = fuse.store().history().ancestors(root).await.map_err(FuseError::from)?;
    let child_depth = depth + 1;
    let pages = ancestors.len().div_ceil(HISTORY_PAGE_SIZE);
    Ok((0..pages)
        .map(|i| Entry::new(format!("{i:03}"), Mode::RoDir, child_depth, Kind::HistoryByPageShard { root, page: i }))
        .collect())
}

async fn history_by_page_shard_entries(fuse: &Fuse, depth: u32, root: Swhid, page: usize) -> Result<Vec<Entry>, FuseError> {
    let ancestors = fuse.store().history().ancestors(root).await.map_err(FuseError::from)?;
    let child_depth = depth + 1;
    let start = page * HISTORY_PAGE_SIZE;
    if start >= ancestors.len() {
        return Ok(Vec::new());
    }
    let end = (start + HISTORY_PAGE_SIZE).min(ancestors.len());
    Ok(ancestors[start..end]
        .iter()
        .map(|a| {
            Entry::new(
                a.to_string(),
                Mode::RoSymlink,
                child_depth,
                Kind::Symlink { target: Entry::relative_archive_path(depth, *a) },
            )
        })
        .collect())
}

async fn history_by_date_entries(fuse: &Fuse, depth: u32, root: Swhid) -> Result<Vec<Entry>, FuseError> {
    let dated = fuse
        .store()
        .history()
        .ancestors_with_date_prefix(root, "")
        .await
        .map_err(FuseError::from)?;
    let total = fuse.store().history().ancestors(root).await.map_err(FuseError::from)?.len();
    let mut out = history_by_date_children(&dated, &[], depth, root);
    if dated.len() < total {
        out.push(Entry::new(".status", Mode::RoFile, depth + 1, Kind::HistoryStatus { root }));
    }
    Ok(out)
}

async fn history_by_date_shard_entries(
    fuse: &Fuse,
    depth: u32,
    root: Swhid,
    shard: &ShardPath,
) -> Result<Vec<Entry>, FuseError> {
    let prefix = format!("{}/", shard.prefix.join("/"));
    let dated = fuse
        .store()
        .history()
        .ancestors_with_date_prefix(root, &prefix)
        .await
        .map_err(FuseError::from)?;
    Ok(history_by_date_children(&dated, &shard.prefix, depth, root))
}

fn history_by_date_children(dated: &[(Swhid, String)], consumed: &[String], depth: u32, root: Swhid) -> Vec<Entry> {
    let child_depth = depth + 1;
    let paths: Vec<&str> = dated.iter().map(|(_, p)| p.as_str()).collect();
    let (dirs, leaves) = shard::next_level(paths.into_iter(), consumed);
    let mut out: Vec<Entry> = dirs
        .into_iter()
        .map(|name| {
            let mut prefix = consumed.to_vec();
            prefix.push(name.clone());
            Entry::new(name, Mode::RoDir, child_depth, Kind::HistoryByDateShard { root, shard: ShardPath { prefix } })
        })
        .collect();
    for leaf in leaves {
        if let Ok(swhid) = leaf.parse::<Swhid>() {
            out.push(Entry::new(
                leaf,
                Mode::RoSymlink,
                child_depth,
                Kind::Symlink { target: Entry::relative_archive_path(depth, swhid) },
            ));
        }
    }
    out
}

async fn release_entries(fuse: &Fuse, depth: u32, swhid: Swhid) -> Result<Vec<Entry>, FuseError> {
    let meta = fuse.get_metadata(swhid).await?;
    let MetadataBody::Release(rel) = meta.body else {
        return Err(FuseError::InvalidRequest(format!("{swhid} is not a release")));
    };
    let child_depth = depth + 1;
    let mut out = vec![
        Entry::new(
            "meta.json",
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: Entry::relative_metadata_path(depth, swhid) },
        ),
        Entry::new(
            "target",
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: Entry::relative_archive_path(depth, rel.target) },
        ),
        Entry::new("target_type", Mode::RoFile, child_depth, Kind::ReleaseType { target_kind: rel.target_type }),
    ];
    if let Some(root) = resolve_release_root(fuse, rel.target, rel.target_type).await {
        out.push(Entry::new(
            "root",
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: Entry::relative_archive_path(depth, root) },
        ));
    }
    Ok(out)
}

async fn snapshot_entries(fuse: &Fuse, depth: u32, swhid: Swhid, shard: &ShardPath) -> Result<Vec<Entry>, FuseError> {
    let meta = fuse.get_metadata(swhid).await?;
    let MetadataBody::Snapshot(branches) = meta.body else {
        return Err(FuseError::InvalidRequest(format!("{swhid} is not a snapshot")));
    };
    let named: Vec<(String, BranchTarget)> = branches
        .into_iter()
        .map(|(name, b)| (String::from_utf8_lossy(&name).into_owned(), b.target))
        .collect();
    let child_depth = depth + 1;
    let paths: Vec<&str> = named.iter().map(|(n, _)| n.as_str()).collect();
    let (dirs, leaves) = shard::next_level(paths.into_iter(), &shard.prefix);
    let mut out: Vec<Entry> = dirs
        .into_iter()
        .map(|name| {
            let mut prefix = shard.prefix.clone();
            prefix.push(name.clone());
            Entry::new(name, Mode::RoDir, child_depth, Kind::Snapshot { swhid, shard: ShardPath { prefix } })
        })
        .collect();
    for leaf in leaves {
        let mut full_path = shard.prefix.clone();
        full_path.push(leaf.clone());
        let full_name = full_path.join("/");
        let Some((_, target)) = named.iter().find(|(n, _)| *n == full_name) else {
            continue;
        };
        match target {
            BranchTarget::Alias(alias) => {
                let alias_name = String::from_utf8_lossy(alias).into_owned();
                let target_path: Vec<String> = alias_name.split('/').map(String::from).collect();
                let rel = shard::relative_branch_path(&full_path, &target_path);
                out.push(Entry::new(leaf, Mode::RoSymlink, child_depth, Kind::Symlink { target: rel }));
            }
            BranchTarget::Swhid(target_swhid) => {
                out.push(Entry::new(
                    leaf,
                    Mode::RoSymlink,
                    child_depth,
                    Kind::Symlink { target: Entry::relative_archive_path(depth, *target_swhid) },
                ));
            }
        }
    }
    Ok(out)
}

async fn origin_visits_entries(fuse: &Fuse, depth: u32, url: &str) -> Result<Vec<Entry>, FuseError> {
    let visits = fuse.get_visits(url).await?;
    let child_depth = depth + 1;
    let mut seen_days = std::collections::HashSet::new();
    let mut out = Vec::new();
    for visit in visits {
        let day = visit.date.format("%Y-%m-%d").to_string();
        if !seen_days.insert(day.clone()) {
            log::debug!("origin '{url}' has more than one visit on {day}, keeping the first");
            continue;
        }
        out.push(Entry::new(day, Mode::RoDir, child_depth, Kind::OriginVisit { url: url.to_owned(), visit }));
    }
    Ok(out)
}

fn origin_visit_entries(fuse: &Fuse, depth: u32, url: &str, visit: &swhfs_backend::Visit) -> Vec<Entry> {
    let child_depth = depth + 1;
    let json = render_json(
        &serde_json::json!({
            "date": visit.date.to_rfc3339(),
            "origin": url,
            "snapshot": visit.snapshot.map(|s| s.to_string()),
        }),
        fuse.json_indent(),
    );
    let mut out = vec![Entry::new("meta.json", Mode::RoFile, child_depth, Kind::MetaFile { bytes: json })];
    if let Some(snp) = visit.snapshot {
        out.push(Entry::new(
            "snapshot",
            Mode::RoSymlink,
            child_depth,
            Kind::Symlink { target: Entry::relative_archive_path(depth, snp) },
        ));
    }
    out
}

/// Renders `value` as pretty JSON indented by `indent` spaces plus a
/// trailing newline, the shape `<SWHID>.json` and visit `meta.json` files
/// share (§6 `json-indent`).
pub fn render_json(value: &serde_json::Value, indent: usize) -> Vec<u8> {
    let indent_bytes = vec![b' '; indent];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent_bytes);
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .expect("serde_json::Value serialization is infallible");
    buf.push(b'\n');
    buf
}

/// §4.4.13 "root... transitively resolving the target through at most one
/// chain of release→release, revision→directory". A content target (or any
/// other non-dir, non-rev, non-rel kind) never resolves.
pub async fn resolve_release_root(fuse: &Fuse, target: Swhid, target_type: swhid::Kind) -> Option<Swhid> {
    match target_type {
        swhid::Kind::Directory => Some(target),
        swhid::Kind::Revision => {
            let meta = fuse.get_metadata(target).await.ok()?;
            match meta.body {
                MetadataBody::Revision(rev) => Some(rev.directory),
                _ => None,
            }
        }
        swhid::Kind::Release => {
            let meta = fuse.get_metadata(target).await.ok()?;
            let MetadataBody::Release(rel) = meta.body else {
                return None;
            };
            match rel.target_type {
                swhid::Kind::Directory => Some(rel.target),
                swhid::Kind::Revision => {
                    let meta2 = fuse.get_metadata(rel.target).await.ok()?;
                    match meta2.body {
                        MetadataBody::Revision(rev2) => Some(rev2.directory),
                        _ => None,
                    }
                }
                _ => None,
            }
        }
        _ => None,
    }
}
