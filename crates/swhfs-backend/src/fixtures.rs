//! A fake [`GraphBackend`]/[`ContentBackend`] pair seeded from literal
//! fixture data, mirroring `swh/fuse/tests/data/api_data.py`'s mocked
//! archive responses. Used by this crate's own tests and re-exported (via
//! the `fixtures` feature) for `swhfs-vfs` and `swhfs-cli` integration
//! tests so none of them ever talk to the real archive.
//!
//! The Linux-kernel `README` content and its containing directory listing
//! below are the exact 35-entry, 727-byte fixture the upstream test suite
//! uses for its content-read and directory-listing scenarios.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use swhid::Swhid;

use crate::error::BackendError;
use crate::model::{
    Branch, BranchTarget, BranchTargetType, ContentMeta, ContentStatus, DirEntry, DirEntryType,
    MaybeText, Metadata, MetadataBody, ReleaseMeta, RevisionMeta, Visit,
};
use crate::{ContentBackend, GraphBackend};

/// The `swh:1:dir:9eb62ef7dd283f7385e7d31af6344d9feedd25de` fixture: the
/// top-level Linux kernel tree, 35 entries.
pub const ROOT_DIR_SWHID: &str = "swh:1:dir:9eb62ef7dd283f7385e7d31af6344d9feedd25de";
/// The `README` content within [`ROOT_DIR_SWHID`].
pub const README_SWHID: &str = "swh:1:cnt:669ac7c32292798644b21dbb5a0dc657125f444d";
/// Exact bytes of the fixture README, 727 bytes.
pub const README_CONTENT: &[u8] = include_bytes!("fixtures/readme.txt");

const ROOT_DIR_ENTRIES: &[(&str, &str, u32, &str)] = &[
    ("file", ".clang-format", 0o100644, "a0a96088c74f49a961a80bc0851a84214b0a9f83"),
    ("file", ".cocciconfig", 0o100644, "43967c6b20151ee126db08e24758e3c789bcb844"),
    ("file", ".get_maintainer.ignore", 0o100644, "a64d219137455f407a7b1f2c6b156c5575852e9e"),
    ("file", ".gitattributes", 0o100644, "4b32eaa9571e64e47b51c43537063f56b204d8b3"),
    ("file", ".gitignore", 0o100644, "162bd2b67bdf6a28be7a361b8418e4e31d542854"),
    ("file", ".mailmap", 0o100644, "332c7833057f51da02805add9b60161ff31aee71"),
    ("file", "COPYING", 0o100644, "a635a38ef9405fdfcfe97f3a435393c1e9cae971"),
    ("file", "CREDITS", 0o100644, "32ee70a7562eec7345e98841473abb438379a4fd"),
    ("dir", "Documentation", 0o40000, "1ba46735273aa020a173c0ad0c813179530dd117"),
    ("file", "Kbuild", 0o100644, "fa441b98c9f6eac1617acf1772ae8b371cfd42aa"),
    ("file", "Kconfig", 0o100644, "745bc773f567067a85ce6574fb41ce80833247d9"),
    ("dir", "LICENSES", 0o40000, "a49a894ea3684b6c044448c37f812356550d14a2"),
    ("file", "MAINTAINERS", 0o100644, "f0068bceeb6158a30c6eee430ca6d2a7e4c4013a"),
    ("file", "Makefile", 0o100644, "f2116815416091dbfa7dcf58ae179ae3241ec1b1"),
    ("file", "README", 0o100644, "669ac7c32292798644b21dbb5a0dc657125f444d"),
    ("dir", "arch", 0o40000, "cf12c1ce4de958ab4ddcb008fe89118b82a3c7b7"),
    ("dir", "block", 0o40000, "a77c89fa64b8ec37c9aa0fa98add54bfb6075257"),
    ("dir", "certs", 0o40000, "527d8f94235029c6f571414df5f8ed2951a0ca5b"),
    ("dir", "crypto", 0o40000, "1fb1357e2d22af4332091937ed960a47f78d0b5e"),
    ("dir", "drivers", 0o40000, "3b5be1ee0216ec59c70e132681be4a5d79e7da9b"),
    ("dir", "fs", 0o40000, "1dbf8d211613db72f5b83b0987023bd5acf866ee"),
    ("dir", "include", 0o40000, "74991fd1a983c6b3f72c8815f7de81a3abddb255"),
    ("dir", "init", 0o40000, "c944a589113271d878e27bbc31ae369edecaff90"),
    ("dir", "ipc", 0o40000, "ff553b9398fea6b2e290ea4a95f7a94f1cf3c22c"),
    ("dir", "kernel", 0o40000, "8c700fd3589e6d2befa4d9b2cc79471eac37da38"),
    ("dir", "lib", 0o40000, "0f2936da43bebe4f26b3be83e8fa392c4f9e82cf"),
    ("dir", "mm", 0o40000, "e15d954c1ed09e6fc29c184515834696d8e70e7c"),
    ("dir", "net", 0o40000, "41e1603b37542d265eade0555e0db66668135575"),
    ("dir", "samples", 0o40000, "9fa649fea3c8ab6b4926f0e7721a21a36b685153"),
    ("dir", "scripts", 0o40000, "e4e5b45d7c44d0bd2c6feb1a257fff7303d2c67e"),
    ("dir", "security", 0o40000, "a4a58d89fc506c3660610105a08de60614cdc980"),
    ("dir", "sound", 0o40000, "bf9e1568b8ce61157a322fddbaab1a0c76be15ef"),
    ("dir", "tools", 0o40000, "83d6279411023bf7edf6bde6ce2e3748912f4936"),
    ("dir", "usr", 0o40000, "aae2ca939e0f7ac6b5e489e4c7835e1a15588cff"),
    ("dir", "virt", 0o40000, "d7f6f10a8509839e404d1cc5af51317ac8b26276"),
];

/// The revision fixture from §8 scenario 3/4:
/// `swh:1:rev:d012a7190fc1fd72ed48911e77ca97ba4521bccd`, whose `root`
/// symlink resolves to [`ROOT_DIR_SWHID`] and which has one parent.
pub const ROOT_REV_SWHID: &str = "swh:1:rev:d012a7190fc1fd72ed48911e77ca97ba4521bccd";
const ROOT_REV_PARENT: &str = "swh:1:rev:aafb16fca0ad5dbc50cf3f396c8d66cf9b8ba1a7";

/// A release fixture pointing at [`ROOT_REV_SWHID`], used to exercise
/// `root` transitive resolution (§4.4.13).
pub const ROOT_REL_SWHID: &str = "swh:1:rel:f494777f314a0f9a8e4d0bb7ea9024aca5a1e5c7";

/// A snapshot fixture with an alias branch (§8 scenario 5).
pub const ALIAS_SNP_SWHID: &str = "swh:1:snp:2498a4b748b7c9d7c10a34d5f3ff1e9e0e9e8ad5";

fn swhid(s: &str) -> Swhid {
    s.parse().expect("fixture SWHID must parse")
}

fn root_dir_metadata() -> Metadata {
    let entries: Vec<DirEntry> = ROOT_DIR_ENTRIES
        .iter()
        .map(|(kind, name, perms, target_hex)| {
            let (entry_type, target_kind) = match *kind {
                "file" => (DirEntryType::File, swhid::Kind::Content),
                "dir" => (DirEntryType::Dir, swhid::Kind::Directory),
                _ => unreachable!(),
            };
            let target = swhid(&format!("swh:1:{}:{}", target_kind.tag(), target_hex));
            DirEntry {
                name: name.as_bytes().to_vec(),
                entry_type,
                target,
                perms: *perms,
                length: None,
                status: None,
            }
        })
        .collect();
    let raw = serde_json::to_value(&entries).unwrap();
    Metadata {
        swhid: swhid(ROOT_DIR_SWHID),
        body: MetadataBody::Directory(entries),
        raw,
    }
}

fn readme_metadata() -> Metadata {
    let body = ContentMeta {
        length: README_CONTENT.len() as u64,
        status: ContentStatus::Visible,
    };
    Metadata {
        swhid: swhid(README_SWHID),
        body: MetadataBody::Content(body),
        raw: serde_json::json!({"length": body.length, "status": "visible"}),
    }
}

fn root_rev_metadata() -> Metadata {
    let body = RevisionMeta {
        id: swhid(ROOT_REV_SWHID),
        directory: swhid(ROOT_DIR_SWHID),
        parents: vec![swhid(ROOT_REV_PARENT)],
        author: MaybeText::Text("Linus Torvalds <torvalds@linux-foundation.org>".into()),
        committer: MaybeText::Text("Linus Torvalds <torvalds@linux-foundation.org>".into()),
        message: MaybeText::Text("Linux 5.9-rc1\n".into()),
        date: Utc.with_ymd_and_hms(2020, 8, 16, 14, 0, 0).single(),
        committer_date: Utc.with_ymd_and_hms(2020, 8, 16, 14, 0, 0).single(),
    };
    let raw = serde_json::to_value(&body).unwrap();
    Metadata {
        swhid: swhid(ROOT_REV_SWHID),
        body: MetadataBody::Revision(body),
        raw,
    }
}

fn parent_rev_metadata() -> Metadata {
    let body = RevisionMeta {
        id: swhid(ROOT_REV_PARENT),
        directory: swhid(ROOT_DIR_SWHID),
        parents: vec![],
        author: MaybeText::Text("Linus Torvalds <torvalds@linux-foundation.org>".into()),
        committer: MaybeText::Text("Linus Torvalds <torvalds@linux-foundation.org>".into()),
        message: MaybeText::Text("Linux 5.8\n".into()),
        date: Utc.with_ymd_and_hms(2020, 8, 2, 14, 0, 0).single(),
        committer_date: Utc.with_ymd_and_hms(2020, 8, 2, 14, 0, 0).single(),
    };
    let raw = serde_json::to_value(&body).unwrap();
    Metadata {
        swhid: swhid(ROOT_REV_PARENT),
        body: MetadataBody::Revision(body),
        raw,
    }
}

fn release_metadata() -> Metadata {
    let body = ReleaseMeta {
        id: swhid(ROOT_REL_SWHID),
        target: swhid(ROOT_REV_SWHID),
        target_type: swhid::Kind::Revision,
        name: MaybeText::Text("v5.9-rc1".into()),
        message: Some(MaybeText::Text("Linux 5.9-rc1 release\n".into())),
        author: Some(MaybeText::Text(
            "Linus Torvalds <torvalds@linux-foundation.org>".into(),
        )),
        date: Utc.with_ymd_and_hms(2020, 8, 16, 15, 0, 0).single(),
    };
    let raw = serde_json::to_value(&body).unwrap();
    Metadata {
        swhid: swhid(ROOT_REL_SWHID),
        body: MetadataBody::Release(body),
        raw,
    }
}

/// `refs/heads/master -> ROOT_REV_SWHID` and
/// `refs/tags/alias-different-subdir -> refs/heads/master` (alias), mirroring
/// §8 scenario 5.
fn snapshot_metadata() -> Metadata {
    let branches = vec![
        (
            b"refs/heads/master".to_vec(),
            Branch {
                target: BranchTarget::Swhid(swhid(ROOT_REV_SWHID)),
                target_type: BranchTargetType::Revision,
            },
        ),
        (
            b"refs/tags/alias-different-subdir".to_vec(),
            Branch {
                target: BranchTarget::Alias(b"refs/heads/master".to_vec()),
                target_type: BranchTargetType::Alias,
            },
        ),
    ];
    let raw = serde_json::to_value(
        branches
            .iter()
            .map(|(n, b)| (String::from_utf8_lossy(n).into_owned(), b))
            .collect::<HashMap<_, _>>(),
    )
    .unwrap();
    Metadata {
        swhid: swhid(ALIAS_SNP_SWHID),
        body: MetadataBody::Snapshot(branches),
        raw,
    }
}

/// An in-memory [`GraphBackend`] + [`ContentBackend`] pair backed by the
/// fixtures above, plus whatever visits were registered with
/// [`FixtureBackend::with_visit`].
pub struct FixtureBackend {
    visits: Mutex<HashMap<String, Vec<Visit>>>,
}

impl Default for FixtureBackend {
    fn default() -> Self {
        Self {
            visits: Mutex::new(HashMap::new()),
        }
    }
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fake visit history for a (percent-encoded) origin URL,
    /// so [`GraphBackend::get_visits`] can resolve it.
    pub fn with_visit(self, url_percent_encoded: &str, visits: Vec<Visit>) -> Self {
        self.visits
            .lock()
            .unwrap()
            .insert(url_percent_encoded.to_owned(), visits);
        self
    }
}

#[async_trait]
impl GraphBackend for FixtureBackend {
    async fn get_metadata(&self, swhid: Swhid) -> Result<Metadata, BackendError> {
        let s = swhid.to_string();
        if s == ROOT_DIR_SWHID {
            Ok(root_dir_metadata())
        } else if s == README_SWHID {
            Ok(readme_metadata())
        } else if s == ROOT_REV_SWHID {
            Ok(root_rev_metadata())
        } else if s == ROOT_REV_PARENT {
            Ok(parent_rev_metadata())
        } else if s == ROOT_REL_SWHID {
            Ok(release_metadata())
        } else if s == ALIAS_SNP_SWHID {
            Ok(snapshot_metadata())
        } else {
            Err(BackendError::NotFound(s))
        }
    }

    async fn get_history(&self, rev: Swhid) -> Result<Vec<(Swhid, Swhid)>, BackendError> {
        crate::require_kind(rev, swhid::Kind::Revision)?;
        if rev.to_string() == ROOT_REV_SWHID {
            Ok(vec![(swhid(ROOT_REV_SWHID), swhid(ROOT_REV_PARENT))])
        } else {
            Ok(Vec::new())
        }
    }

    async fn get_visits(&self, url_percent_encoded: &str) -> Result<Vec<Visit>, BackendError> {
        self.visits
            .lock()
            .unwrap()
            .get(url_percent_encoded)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(url_percent_encoded.to_owned()))
    }
}

#[async_trait]
impl ContentBackend for FixtureBackend {
    async fn get_blob(&self, cnt: Swhid) -> Result<Vec<u8>, BackendError> {
        crate::require_kind(cnt, swhid::Kind::Content)?;
        if cnt.to_string() == README_SWHID {
            Ok(README_CONTENT.to_vec())
        } else {
            Err(BackendError::NotFound(cnt.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn readme_is_727_bytes() {
        let backend = FixtureBackend::new();
        let blob = backend.get_blob(swhid(README_SWHID)).await.unwrap();
        assert_eq!(blob.len(), 727);
        assert!(blob.starts_with(b"Linux kernel\n"));
    }

    #[tokio::test]
    async fn root_dir_has_35_entries() {
        let backend = FixtureBackend::new();
        let meta = backend.get_metadata(swhid(ROOT_DIR_SWHID)).await.unwrap();
        let MetadataBody::Directory(entries) = meta.body else {
            panic!("expected directory metadata");
        };
        assert_eq!(entries.len(), 35);
        assert!(entries.iter().any(|e| e.name == b"README"));
    }

    #[tokio::test]
    async fn revision_chain_resolves() {
        let backend = FixtureBackend::new();
        let meta = backend.get_metadata(swhid(ROOT_REV_SWHID)).await.unwrap();
        let MetadataBody::Revision(rev) = meta.body else {
            panic!("expected revision metadata");
        };
        assert_eq!(rev.directory, swhid(ROOT_DIR_SWHID));
        assert_eq!(rev.parents, vec![swhid(ROOT_REV_PARENT)]);
    }

    #[tokio::test]
    async fn history_walks_one_edge() {
        let backend = FixtureBackend::new();
        let edges = backend.get_history(swhid(ROOT_REV_SWHID)).await.unwrap();
        assert_eq!(edges, vec![(swhid(ROOT_REV_SWHID), swhid(ROOT_REV_PARENT))]);
    }
}
