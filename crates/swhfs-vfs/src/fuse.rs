//! The VFS core (§4.5): owns the inode table, the directory-listing LRU,
//! and the configured backends/caches, and answers the four top-level
//! helpers (`get_metadata`, `get_blob`, `get_history`, `get_visits`) plus
//! directory materialisation for the `fuser::Filesystem` dispatcher in
//! [`crate::session`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use swhfs_backend::{ContentBackend, GraphBackend, Metadata, Visit};
use swhfs_cache::{Budget, DirEntryCache, Store};
use swhid::Swhid;

use crate::entry::{Entry, Kind, Mode};
use crate::error::FuseError;
use crate::inode::InodeTable;
use crate::tree;

/// Runtime knobs the `Fuse` core needs beyond the cache/backend wiring
/// (§6 `json-indent`).
pub struct FuseConfig {
    pub json_indent: usize,
}

/// One child materialised under a parent directory: the inode freshly
/// allocated for it (or reused, on a `DirEntryCache` hit) paired with the
/// entry it names. Cached as a unit so a cache hit doesn't need to
/// re-allocate inodes for names the kernel has already seen (§5
/// "`readdir`... sees a stable sequence").
#[derive(Debug, Clone)]
pub struct Child {
    pub inode: u64,
    pub entry: Entry,
}

/// The Fuse core (§4.5, §9 "the Fuse owns the inode table"). Entry nodes
/// reference it only through this core's methods, never by shared
/// ownership, per the design note on cyclic references.
pub struct Fuse {
    inodes: InodeTable,
    store: Store,
    graph: Arc<dyn GraphBackend>,
    content: Arc<dyn ContentBackend>,
    config: FuseConfig,
    direntry_cache: Mutex<DirEntryCache<Child>>,
    history_prefetch_started: Mutex<std::collections::HashSet<Swhid>>,
    by_date_inodes: Mutex<HashMap<Swhid, Vec<u64>>>,
}

impl Fuse {
    pub fn new(
        store: Store,
        graph: Arc<dyn GraphBackend>,
        content: Arc<dyn ContentBackend>,
        config: FuseConfig,
        direntry_budget: Budget,
        total_ram_bytes: usize,
    ) -> Self {
        let root = Entry::new("", Mode::RoDir, 0, Kind::RootDir);
        Self {
            inodes: InodeTable::new(root),
            store,
            graph,
            content,
            config,
            direntry_cache: Mutex::new(DirEntryCache::new(direntry_budget, total_ram_bytes)),
            history_prefetch_started: Mutex::new(std::collections::HashSet::new()),
            by_date_inodes: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    pub fn json_indent(&self) -> usize {
        self.config.json_indent
    }

    /// §4.5 `get_metadata`: cache miss falls through to the backend, the
    /// result is stored, then re-read so callers always see what the
    /// cache actually persisted.
    pub async fn get_metadata(&self, swhid: Swhid) -> Result<Metadata, FuseError> {
        if let Some(meta) = self.store.metadata().get(swhid).await? {
            return Ok(meta);
        }
        let meta = self.graph.get_metadata(swhid).await?;
        self.store.metadata().set(meta.clone()).await?;
        Ok(self.store.metadata().get(swhid).await?.unwrap_or(meta))
    }

    /// §4.5 `get_blob`: rejects non-`cnt` SWHIDs with `EINVAL` before
    /// touching the cache.
    pub async fn get_blob(&self, swhid: Swhid) -> Result<Vec<u8>, FuseError> {
        if swhid.kind() != swhid::Kind::Content {
            return Err(FuseError::InvalidRequest(format!("{swhid} is not a content")));
        }
        if let Some(bytes) = self.store.blob().get(swhid).await? {
            return Ok(bytes);
        }
        let bytes = self.content.get_blob(swhid).await?;
        self.store.blob().set(swhid, bytes.clone()).await?;
        Ok(bytes)
    }

    /// §4.5 `get_history`: rejects non-`rev` SWHIDs with `EINVAL`; a
    /// no-op if this revision's ancestry has already been loaded.
    pub async fn get_history(&self, rev: Swhid) -> Result<(), FuseError> {
        if rev.kind() != swhid::Kind::Revision {
            return Err(FuseError::InvalidRequest(format!("{rev} is not a revision")));
        }
        if self.store.history().has_history(rev).await? {
            return Ok(());
        }
        let edges = self.graph.get_history(rev).await?;
        self.store.history().set(edges).await?;
        Ok(())
    }

    pub async fn get_visits(&self, url_percent_encoded: &str) -> Result<Vec<Visit>, FuseError> {
        if let Some(visits) = self.store.visits().get(url_percent_encoded).await? {
            return Ok(visits);
        }
        let visits = self.graph.get_visits(url_percent_encoded).await?;
        self.store.visits().set(url_percent_encoded, visits.clone()).await?;
        Ok(visits)
    }

    /// §4.4.9: background ancestor-metadata prefetch for `root`'s
    /// history, kicked off at most once per root per mount session.
    /// Invalidates every cached `by-date` listing for `root` every 100
    /// fetches (§4.4.12), so a `readdir` in progress sees the shard grow.
    pub fn spawn_history_prefetch(self: &Arc<Self>, root: Swhid) {
        {
            let mut started = self.history_prefetch_started.lock();
            if !started.insert(root) {
                return;
            }
        }
        let fuse = Arc::clone(self);
        tokio::task::spawn(async move {
            let ancestors = match fuse.store.history().ancestors(root).await {
                Ok(ancestors) => ancestors,
                Err(err) => {
                    log::warn!("history prefetch for {root} could not read ancestors: {err:#}");
                    return;
                }
            };
            let total = ancestors.len();
            for (done, ancestor) in ancestors.into_iter().enumerate() {
                if let Err(err) = fuse.get_metadata(ancestor).await {
                    log::debug!("history prefetch metadata miss for {ancestor}: {err}");
                }
                if (done + 1) % 100 == 0 {
                    fuse.invalidate_by_date(root);
                }
            }
            fuse.invalidate_by_date(root);
            log::info!("history prefetch for {root} complete ({total} ancestors)");
        });
    }

    /// Record that `inode` was allocated for `root`'s `by-date` directory
    /// (or one of its shards), so a later status change can invalidate
    /// it. Called from [`crate::session`] whenever it materialises a
    /// [`Kind::HistoryByDate`] or [`Kind::HistoryByDateShard`] entry.
    pub fn register_by_date_inode(&self, root: Swhid, inode: u64) {
        self.by_date_inodes.lock().entry(root).or_default().push(inode);
    }

    fn invalidate_by_date(&self, root: Swhid) {
        let inodes = self.by_date_inodes.lock().remove(&root).unwrap_or_default();
        let mut cache = self.direntry_cache.lock();
        for inode in inodes {
            cache.invalidate(inode);
        }
    }

    /// The size to report from `getattr`, without reading the blob when
    /// the length is already known from cached metadata (§3 "A Content's
    /// `size()` equals its blob length").
    pub async fn entry_size(&self, entry: &Entry) -> Result<u64, FuseError> {
        match &entry.kind {
            Kind::Content(swhid) => {
                if let Some(meta) = self.store.metadata().get(*swhid).await? {
                    if let swhfs_backend::MetadataBody::Content(content) = meta.body {
                        return Ok(content.length);
                    }
                }
                Ok(self.get_blob(*swhid).await?.len() as u64)
            }
            Kind::MetaFile { bytes } => Ok(bytes.len() as u64),
            Kind::MetadataEntry(swhid) => Ok(self.render_metadata_entry(*swhid).await?.len() as u64),
            Kind::Readme => Ok(crate::entry::README_BANNER.len() as u64),
            Kind::HistoryStatus { root } => Ok(self.render_history_status(*root).await?.len() as u64),
            Kind::ReleaseType { target_kind } => Ok(format!("{target_kind}\n").len() as u64),
            Kind::Symlink { target } => Ok(target.len() as u64),
            _ => Ok(0),
        }
    }

    /// The bytes `read` returns for a regular file or the link target for
    /// a symlink entry (§4.4.5, §4.5 `readlink`).
    pub async fn entry_content(&self, entry: &Entry) -> Result<Vec<u8>, FuseError> {
        match &entry.kind {
            Kind::Content(swhid) => self.get_blob(*swhid).await,
            Kind::Readme => Ok(crate::entry::README_BANNER.to_vec()),
            Kind::MetaFile { bytes } => Ok(bytes.clone()),
            Kind::MetadataEntry(swhid) => self.render_metadata_entry(*swhid).await,
            Kind::HistoryStatus { root } => self.render_history_status(*root).await,
            Kind::ReleaseType { target_kind } => Ok(format!("{target_kind}\n").into_bytes()),
            Kind::Symlink { target } => Ok(target.clone().into_bytes()),
            _ => Err(FuseError::InvalidRequest(format!("{} has no content", entry.name))),
        }
    }

    /// Renders `archive/<SWHID>.json` from the raw JSON the backend
    /// returned, forcing a fetch on a cache miss (§4.4.2).
    async fn render_metadata_entry(&self, swhid: Swhid) -> Result<Vec<u8>, FuseError> {
        let raw = match self.store.metadata().get_raw_json(swhid).await? {
            Some(raw) => raw,
            None => {
                self.get_metadata(swhid).await?;
                self.store
                    .metadata()
                    .get_raw_json(swhid)
                    .await?
                    .ok_or(FuseError::NotFound)?
            }
        };
        Ok(tree::render_json(&raw, self.json_indent()))
    }

    /// Renders the `by-date/.status` file (§4.4.12): `Done: <fetched>/<total>\n`.
    async fn render_history_status(&self, root: Swhid) -> Result<Vec<u8>, FuseError> {
        let total = self.store.history().ancestors(root).await.map_err(FuseError::from)?.len();
        let fetched = self
            .store
            .history()
            .ancestors_with_date_prefix(root, "")
            .await
            .map_err(FuseError::from)?
            .len();
        Ok(format!("Done: {fetched}/{total}\n").into_bytes())
    }

    /// §5 "get_entries caching": on a `DirEntryCache` hit, return the
    /// cached children as-is (inodes and all); on a miss, materialise via
    /// [`tree::compute_entries`], allocate an inode for each child, and,
    /// unless `entry`'s kind is exempt, cache the result under `inode`.
    pub async fn get_entries(self: &Arc<Self>, inode: u64, entry: &Entry) -> Result<Vec<Child>, FuseError> {
        if !tree::is_exempt(&entry.kind) {
            if let Some(children) = self.direntry_cache.lock().get(inode) {
                return Ok(children.to_vec());
            }
        }
        let entries = tree::compute_entries(self, entry).await?;
        let children: Vec<Child> = entries
            .into_iter()
            .map(|child_entry| {
                let child_inode = self.inodes.alloc(child_entry.clone());
                if let Kind::HistoryByDate { root } | Kind::HistoryByDateShard { root, .. } = child_entry.kind {
                    self.register_by_date_inode(root, child_inode);
                }
                Child { inode: child_inode, entry: child_entry }
            })
            .collect();
        if !tree::is_exempt(&entry.kind) {
            self.direntry_cache.lock().set(inode, children.clone());
        }
        Ok(children)
    }

    /// §4.4 `lookup`, allocating a fresh inode for the resolved child (if
    /// any) rather than returning a bare [`Entry`].
    pub async fn lookup(self: &Arc<Self>, parent: &Entry, name: &str) -> Result<Child, FuseError> {
        if let Some(re) = tree::name_regex(&parent.kind) {
            if !re.is_match(name) {
                return Err(FuseError::NotFound);
            }
        }
        let child_entry = tree::lookup(self, parent, name).await?.ok_or(FuseError::NotFound)?;
        let child_inode = self.inodes.alloc(child_entry.clone());
        if let Kind::HistoryByDate { root } | Kind::HistoryByDateShard { root, .. } = child_entry.kind {
            self.register_by_date_inode(root, child_inode);
        }
        Ok(Child { inode: child_inode, entry: child_entry })
    }

    pub async fn unlink(&self, parent: &Entry, name: &str) -> Result<(), FuseError> {
        tree::unlink(self, parent, name).await
    }
}
