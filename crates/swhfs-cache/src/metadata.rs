//! `metadata_cache` (§4.3): the persistent `swhid -> {metadata_blob,
//! date_prefix}` table, shared with [`crate::history::HistoryCache`] and
//! [`crate::visits::VisitsCache`] in one database so the by-date history
//! shard can join against it (§4.3, §4.4.12).

use rusqlite::{params, OptionalExtension};
use swhfs_backend::Metadata;
use swhid::Swhid;

use crate::db::Db;

/// Create `metadata_cache` if it doesn't exist yet. Called once per shared
/// database at open time by [`crate::store::Store`].
pub(crate) fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS metadata_cache (
            swhid TEXT PRIMARY KEY,
            metadata TEXT NOT NULL,
            date TEXT
        );",
    )
}

/// Persistent cache of archive object metadata, keyed by SWHID.
#[derive(Clone)]
pub struct MetadataCache {
    db: Db,
}

impl MetadataCache {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    /// Return the cached, typed metadata for `swhid`, or `None` on a miss.
    pub async fn get(&self, swhid: Swhid) -> anyhow::Result<Option<Metadata>> {
        let key = swhid.to_string();
        let raw: Option<String> = self
            .db
            .with(move |conn| {
                conn.query_row(
                    "SELECT metadata FROM metadata_cache WHERE swhid = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Return the exact JSON text stored for `swhid`, used to render
    /// `<SWHID>.json` byte-for-byte from what the archive actually
    /// returned (§4.4.2), rather than re-serializing our typed model.
    pub async fn get_raw_json(&self, swhid: Swhid) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.get(swhid).await?.map(|m| m.raw))
    }

    /// Insert or replace the cached metadata for `swhid`. The `date`
    /// column is populated from [`Metadata::date_prefix`] so by-date
    /// history shards can be resolved by SQL join alone (§4.3, §4.4.12).
    ///
    /// Uses `INSERT OR REPLACE`, making concurrent writers for the same
    /// SWHID idempotent (§5 "Concurrent-build safety").
    pub async fn set(&self, metadata: Metadata) -> anyhow::Result<()> {
        let key = metadata.swhid.to_string();
        let date_prefix = metadata.date_prefix();
        let json = serde_json::to_string(&metadata)?;
        self.db
            .with(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO metadata_cache (swhid, metadata, date) VALUES (?1, ?2, ?3)",
                    params![key, json, date_prefix],
                )
            })
            .await?;
        Ok(())
    }

    /// Delete the cached row for `swhid`, invoked from `cache/<shard>/<SWHID>`
    /// unlink (§4.3, §4.4.4).
    pub async fn remove(&self, swhid: Swhid) -> anyhow::Result<()> {
        let key = swhid.to_string();
        self.db
            .with(move |conn| conn.execute("DELETE FROM metadata_cache WHERE swhid = ?1", params![key]))
            .await?;
        Ok(())
    }

    /// All SWHIDs currently materialised in the cache, used to render
    /// `cache/` listings (§4.4.4). Parse failures (which should not
    /// happen for rows this cache itself wrote) are skipped rather than
    /// failing the whole listing.
    pub async fn cached_swhids(&self) -> anyhow::Result<Vec<Swhid>> {
        let rows: Vec<String> = self
            .db
            .with(|conn| {
                let mut stmt = conn.prepare("SELECT swhid FROM metadata_cache")?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows.into_iter().filter_map(|s| s.parse().ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn test_store() -> Store {
        Store::open_in_memory("metadata-cache-test").unwrap()
    }

    #[tokio::test]
    async fn round_trips_metadata() {
        let store = test_store();
        let cache = store.metadata();
        let swhid: Swhid = "swh:1:cnt:669ac7c32292798644b21dbb5a0dc657125f444d"
            .parse()
            .unwrap();
        assert!(cache.get(swhid).await.unwrap().is_none());

        let meta = Metadata {
            swhid,
            body: swhfs_backend::MetadataBody::Content(swhfs_backend::ContentMeta {
                length: 727,
                status: swhfs_backend::ContentStatus::Visible,
            }),
            raw: serde_json::json!({"length": 727, "status": "visible"}),
        };
        cache.set(meta.clone()).await.unwrap();

        let got = cache.get(swhid).await.unwrap().unwrap();
        assert_eq!(got, meta);
        assert_eq!(cache.cached_swhids().await.unwrap(), vec![swhid]);

        cache.remove(swhid).await.unwrap();
        assert!(cache.get(swhid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn round_trips_directory_metadata() {
        let store = test_store();
        let cache = store.metadata();
        let swhid: Swhid = "swh:1:dir:9eb62ef7dd283f7385e7d31af6344d9feedd25de"
            .parse()
            .unwrap();
        let target: Swhid = "swh:1:cnt:669ac7c32292798644b21dbb5a0dc657125f444d"
            .parse()
            .unwrap();

        let meta = Metadata {
            swhid,
            body: swhfs_backend::MetadataBody::Directory(vec![swhfs_backend::DirEntry {
                name: b"README".to_vec(),
                entry_type: swhfs_backend::DirEntryType::File,
                target,
                perms: 0o100644,
                length: Some(727),
                status: Some(swhfs_backend::ContentStatus::Visible),
            }]),
            raw: serde_json::json!([{"name": "README", "type": "file", "target": target.to_string()}]),
        };
        cache.set(meta.clone()).await.unwrap();

        let got = cache.get(swhid).await.unwrap().unwrap();
        assert_eq!(got, meta);
    }

    #[tokio::test]
    async fn round_trips_snapshot_metadata() {
        let store = test_store();
        let cache = store.metadata();
        let swhid: Swhid = "swh:1:snp:0000000000000000000000000000000000000000"
            .parse()
            .unwrap();
        let target: Swhid = "swh:1:rev:1111111111111111111111111111111111111111"
            .parse()
            .unwrap();

        let meta = Metadata {
            swhid,
            body: swhfs_backend::MetadataBody::Snapshot(vec![(
                b"refs/heads/master".to_vec(),
                swhfs_backend::Branch {
                    target: swhfs_backend::BranchTarget::Swhid(target),
                    target_type: swhfs_backend::BranchTargetType::Revision,
                },
            )]),
            raw: serde_json::json!({"refs/heads/master": {"target": target.to_string(), "target_type": "revision"}}),
        };
        cache.set(meta.clone()).await.unwrap();

        let got = cache.get(swhid).await.unwrap().unwrap();
        assert_eq!(got, meta);
    }
}
