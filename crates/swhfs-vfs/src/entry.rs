//! The entry tree (§3, §4.4): the typed nodes that make up the mounted
//! view. An [`Entry`] is a cheap, self-contained description of one tree
//! node; all mutable state (fetched metadata, blobs, history edges) lives
//! in the caches owned by [`crate::fuse::Fuse`], not on the entry itself —
//! entries are reconstructed on lookup rather than kept alive across
//! kernel callbacks.

use swhfs_backend::Visit;
use swhid::Swhid;

/// POSIX mode class. Permission bits for `Directory`/`Content` children
/// come from the archive itself (§3); these four classes cover every
/// other node, which all have a fixed mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    RoFile,
    RoDir,
    /// Only `cache/` shard directories: read-write so `rm` can evict.
    RwDir,
    RoSymlink,
    /// An archived file or directory entry, whose permission bits are
    /// exactly what the archive recorded (§3 "Directory entries'
    /// permissions come from the archive").
    Archived(u32),
}

impl Mode {
    /// The base `st_mode` bits (file type), not counting the permission
    /// bits carried by [`Mode::Archived`].
    pub fn file_type(self) -> fuser::FileType {
        match self {
            Mode::RoFile => fuser::FileType::RegularFile,
            Mode::RoDir | Mode::RwDir => fuser::FileType::Directory,
            Mode::RoSymlink => fuser::FileType::Symlink,
            Mode::Archived(perms) => {
                // git perms: 120000 = symlink, 040000 = dir, 100*** = file
                match perms {
                    0o120000 => fuser::FileType::Symlink,
                    0o040000 => fuser::FileType::Directory,
                    _ => fuser::FileType::RegularFile,
                }
            }
        }
    }

    /// The permission bits fuser expects in `FileAttr::perm` (the low 9
    /// bits), regardless of file type.
    pub fn perm(self) -> u16 {
        match self {
            Mode::RoFile => 0o444,
            Mode::RoDir | Mode::RwDir => 0o555,
            Mode::RoSymlink => 0o777,
            Mode::Archived(perms) => (perms & 0o777) as u16,
        }
    }
}

/// Per-entry file-info flags (§3 `file_info`), consulted when answering
/// `open`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileInfo {
    /// Kernel may cache page contents across opens.
    pub keep_cache: bool,
    /// Force direct I/O, bypassing the kernel page cache: used for the
    /// `by-date/.status` file, which must be recomputed on every read
    /// (§4.4.12).
    pub direct_io: bool,
}

/// Path segments already consumed walking down a recursively sharded
/// tree (a `Snapshot`'s branch names, or a `by-date` history shard's
/// `YYYY/MM/DD` levels), e.g. `["refs", "tags"]` or `["2020", "08"]`.
#[derive(Debug, Clone)]
pub struct ShardPath {
    pub prefix: Vec<String>,
}

/// Every node the mounted tree can contain (§3 Entry variants table).
#[derive(Debug, Clone)]
pub enum Kind {
    RootDir,
    ArchiveDir,
    OriginDir,
    CacheDir,
    /// `cache/<2-hex>/` shard.
    CacheShard { hex_prefix: String },
    Readme,
    Content(Swhid),
    Directory(Swhid),
    Revision(Swhid),
    RevisionParents { parents: Vec<Swhid> },
    RevisionHistory(Swhid),
    HistoryByHash { root: Swhid },
    HistoryByHashShard { root: Swhid, hex_prefix: String },
    HistoryByPage { root: Swhid },
    HistoryByPageShard { root: Swhid, page: usize },
    HistoryByDate { root: Swhid },
    HistoryByDateShard { root: Swhid, shard: ShardPath },
    HistoryStatus { root: Swhid },
    Release(Swhid),
    ReleaseType { target_kind: swhid::Kind },
    Snapshot { swhid: Swhid, shard: ShardPath },
    Origin(String),
    OriginVisit { url: String, visit: Visit },
    /// Static inline content, rendered once and never refetched (`meta.json`
    /// for a visit, the README banner).
    MetaFile { bytes: Vec<u8> },
    /// `<SWHID>.json`, rendered from the metadata cache on each read.
    MetadataEntry(Swhid),
    Symlink { target: String },
}

impl Kind {
    /// The SWHID this node is conceptually "about", if any — used both to
    /// answer `getxattr(user.swhid)` (§6) and to compute relative symlink
    /// targets for children.
    pub fn swhid(&self) -> Option<Swhid> {
        match self {
            Kind::Content(s)
            | Kind::Directory(s)
            | Kind::Revision(s)
            | Kind::RevisionHistory(s)
            | Kind::HistoryByHash { root: s }
            | Kind::HistoryByPage { root: s }
            | Kind::HistoryByDate { root: s }
            | Kind::HistoryStatus { root: s }
            | Kind::Release(s)
            | Kind::Snapshot { swhid: s, .. }
            | Kind::MetadataEntry(s) => Some(*s),
            _ => None,
        }
    }
}

/// One node of the mounted tree (§3 `Entry`).
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub mode: Mode,
    pub depth: u32,
    pub kind: Kind,
}

impl Entry {
    pub fn new(name: impl Into<String>, mode: Mode, depth: u32, kind: Kind) -> Self {
        Self {
            name: name.into(),
            mode,
            depth,
            kind,
        }
    }

    pub fn file_info(&self) -> FileInfo {
        match &self.kind {
            Kind::HistoryStatus { .. } => FileInfo {
                keep_cache: false,
                direct_io: true,
            },
            Kind::Content(_) => FileInfo {
                keep_cache: true,
                direct_io: false,
            },
            _ => FileInfo {
                keep_cache: true,
                direct_io: false,
            },
        }
    }

    /// Relative symlink target from an entry at `depth` down to
    /// `archive/<swhid>` (§3 "relative symlink targets"). `depth` is the
    /// depth of the symlink entry itself: each level above the mount root
    /// needs one more `../`.
    pub fn relative_archive_path(depth: u32, swhid: Swhid) -> String {
        format!("{}archive/{swhid}", "../".repeat(depth as usize))
    }

    /// Relative symlink target from a symlink at `depth` to the
    /// metadata-entry file `archive/<swhid>.json`.
    pub fn relative_metadata_path(depth: u32, swhid: Swhid) -> String {
        format!("{}archive/{swhid}.json", "../".repeat(depth as usize))
    }
}

/// Children of [`Kind::RootDir`] (§4.4.1): fixed, no backend I/O.
pub fn root_children() -> Vec<Entry> {
    vec![
        Entry::new("archive", Mode::RoDir, 1, Kind::ArchiveDir),
        Entry::new("origin", Mode::RoDir, 1, Kind::OriginDir),
        Entry::new("cache", Mode::RoDir, 1, Kind::CacheDir),
        Entry::new("README", Mode::RoFile, 1, Kind::Readme),
    ]
}

pub const README_BANNER: &[u8] = b"\
This is a Software Heritage FUSE mount.

archive/  -- look up any object by its SWHID (or SWHID.json for raw metadata)
origin/   -- look up any previously visited origin by its percent-encoded URL
cache/    -- mirrors the on-disk cache; remove an entry here to evict it
";
