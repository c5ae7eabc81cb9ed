//! Wires the four persistent caches together behind the two database files
//! §6 describes: one shared by metadata/visits/history (so the by-date
//! history shard can join `history_graph` against `metadata_cache`), one
//! dedicated to blobs.

use std::path::PathBuf;

use crate::blob::BlobCache;
use crate::db::{location_from_config, Db, DbLocation};
use crate::history::HistoryCache;
use crate::metadata::MetadataCache;
use crate::visits::VisitsCache;

/// Handle to the opened caches for one mount session (§3 "Lifecycles":
/// caches outlive the process and are shared globally across mounts).
#[derive(Clone)]
pub struct Store {
    metadata_db: Db,
    metadata: MetadataCache,
    visits: VisitsCache,
    history: HistoryCache,
    blob: BlobCache,
}

/// How to open each of the two database files, derived from `cache.*`
/// configuration (§6).
pub struct StoreConfig {
    pub metadata_path: Option<PathBuf>,
    pub metadata_in_memory: bool,
    pub blob_path: Option<PathBuf>,
    pub blob_in_memory: bool,
    pub blob_bypass: bool,
}

impl Store {
    /// Open (creating if needed) the metadata+history+visits database and
    /// the blob database, per `config`.
    pub fn open(config: StoreConfig) -> anyhow::Result<Self> {
        let metadata_location = location_from_config(
            config.metadata_path.as_deref(),
            config.metadata_in_memory,
            "metadata",
        );
        let metadata_db = Db::open(metadata_location)?;
        Self::init_shared_schema(&metadata_db)?;

        let blob = if config.blob_bypass {
            log::info!("blob cache bypass enabled: blobs are never persisted to disk");
            BlobCache::bypass()
        } else {
            let blob_location =
                location_from_config(config.blob_path.as_deref(), config.blob_in_memory, "blob");
            let blob_db = Db::open(blob_location)?;
            Self::init_blob_schema(&blob_db)?;
            BlobCache::new(blob_db)
        };

        Ok(Self {
            metadata: MetadataCache::new(metadata_db.clone()),
            visits: VisitsCache::new(metadata_db.clone()),
            history: HistoryCache::new(metadata_db.clone()),
            metadata_db,
            blob,
        })
    }

    /// Open every cache as an in-memory, shared-cache SQLite database, for
    /// tests (§4.3 "In-memory (anonymous) mode is supported for tests").
    pub fn open_in_memory(name: &str) -> anyhow::Result<Self> {
        let metadata_db = Db::open(DbLocation::InMemory {
            name: format!("{name}-metadata"),
        })?;
        Self::init_shared_schema(&metadata_db)?;
        let blob_db = Db::open(DbLocation::InMemory {
            name: format!("{name}-blob"),
        })?;
        Self::init_blob_schema(&blob_db)?;

        Ok(Self {
            metadata: MetadataCache::new(metadata_db.clone()),
            visits: VisitsCache::new(metadata_db.clone()),
            history: HistoryCache::new(metadata_db.clone()),
            metadata_db,
            blob: BlobCache::new(blob_db),
        })
    }

    fn init_shared_schema(db: &Db) -> anyhow::Result<()> {
        db.with_blocking(|conn| {
            crate::metadata::init_schema(conn)?;
            crate::visits::init_schema(conn)?;
            crate::history::init_schema(conn)
        })
    }

    fn init_blob_schema(db: &Db) -> anyhow::Result<()> {
        db.with_blocking(crate::blob::init_schema)
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn visits(&self) -> &VisitsCache {
        &self.visits
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn blob(&self) -> &BlobCache {
        &self.blob
    }

    /// Raw access to the shared metadata/visits/history database, used by
    /// tests that need to seed rows outside the typed cache APIs.
    pub fn metadata_db(&self) -> &Db {
        &self.metadata_db
    }
}
