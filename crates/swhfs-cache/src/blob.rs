//! `blob_cache` (§4.3): persistent `cnt_swhid -> bytes`, kept in its own
//! database file (§6) so it can grow independently of metadata/history and
//! be wiped by the `clean` CLI subcommand without touching them.

use rusqlite::{params, OptionalExtension};
use swhid::Swhid;

use crate::db::Db;

pub(crate) fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS blob_cache (
            swhid TEXT PRIMARY KEY,
            blob BLOB NOT NULL
        );",
    )
}

/// Persistent cache of content blob bytes, or a pass-through stub when
/// `cache.blob.bypass` is set (§9 open question: bypass skips the cache
/// entirely and always defers to the content backend).
#[derive(Clone)]
pub enum BlobCache {
    Cached(Db),
    Bypass,
}

impl BlobCache {
    pub(crate) fn new(db: Db) -> Self {
        Self::Cached(db)
    }

    pub fn bypass() -> Self {
        Self::Bypass
    }

    pub async fn get(&self, swhid: Swhid) -> anyhow::Result<Option<Vec<u8>>> {
        let Self::Cached(db) = self else {
            return Ok(None);
        };
        let key = swhid.to_string();
        db.with(move |conn| {
            conn.query_row(
                "SELECT blob FROM blob_cache WHERE swhid = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    /// Insert or replace the cached blob for `swhid`. A no-op when bypassed.
    pub async fn set(&self, swhid: Swhid, blob: Vec<u8>) -> anyhow::Result<()> {
        let Self::Cached(db) = self else {
            return Ok(());
        };
        let key = swhid.to_string();
        db.with(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO blob_cache (swhid, blob) VALUES (?1, ?2)",
                params![key, blob],
            )
        })
        .await?;
        Ok(())
    }

    /// Delete the cached row for `swhid`, invoked alongside
    /// [`crate::metadata::MetadataCache::remove`] from a `cache/` unlink
    /// (§4.3, §4.4.4). A no-op when bypassed.
    pub async fn remove(&self, swhid: Swhid) -> anyhow::Result<()> {
        let Self::Cached(db) = self else {
            return Ok(());
        };
        let key = swhid.to_string();
        db.with(move |conn| conn.execute("DELETE FROM blob_cache WHERE swhid = ?1", params![key]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, DbLocation};

    #[tokio::test]
    async fn round_trips_blob() {
        let db = Db::open(DbLocation::InMemory {
            name: "blob-cache-roundtrip-test".into(),
        })
        .unwrap();
        db.with(init_schema).await.unwrap();
        let cache = BlobCache::new(db);

        let swhid: Swhid = "swh:1:cnt:669ac7c32292798644b21dbb5a0dc657125f444d"
            .parse()
            .unwrap();
        assert!(cache.get(swhid).await.unwrap().is_none());

        cache.set(swhid, b"hello world".to_vec()).await.unwrap();
        assert_eq!(cache.get(swhid).await.unwrap().unwrap(), b"hello world");

        cache.remove(swhid).await.unwrap();
        assert!(cache.get(swhid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bypass_never_caches() {
        let cache = BlobCache::bypass();
        let swhid: Swhid = "swh:1:cnt:669ac7c32292798644b21dbb5a0dc657125f444d"
            .parse()
            .unwrap();
        cache.set(swhid, b"hello".to_vec()).await.unwrap();
        assert!(cache.get(swhid).await.unwrap().is_none());
    }
}
