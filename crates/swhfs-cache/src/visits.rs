//! `visits_cache` (§4.3): persistent `url -> {metadata_blob,
//! insertion_time}`, with a 24-hour freshness window (§9 open question)
//! after which a cached entry is treated as a miss so [`Fuse::get_visits`]
//! (in `swhfs-vfs`) re-requests it.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use swhfs_backend::Visit;

use crate::db::Db;

/// How long a cached visit list is considered fresh before a `get` treats
/// it as a miss (§9 "Open question": the only implicit-invalidation path
/// in an otherwise append-only cache).
pub const FRESHNESS_WINDOW: Duration = Duration::hours(24);

pub(crate) fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS visits_cache (
            url TEXT PRIMARY KEY,
            metadata TEXT NOT NULL,
            insertion_time TEXT NOT NULL
        );",
    )
}

/// Persistent cache of origin visit histories, keyed by percent-encoded
/// URL.
#[derive(Clone)]
pub struct VisitsCache {
    db: Db,
}

impl VisitsCache {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    /// Return the cached visits for `url`, or `None` if there's no row, or
    /// if the row is older than [`FRESHNESS_WINDOW`] (forcing a refresh).
    pub async fn get(&self, url_percent_encoded: &str) -> anyhow::Result<Option<Vec<Visit>>> {
        let key = url_percent_encoded.to_owned();
        let row: Option<(String, String)> = self
            .db
            .with(move |conn| {
                conn.query_row(
                    "SELECT metadata, insertion_time FROM visits_cache WHERE url = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await?;

        let Some((json, inserted_at)) = row else {
            return Ok(None);
        };
        let inserted_at: DateTime<Utc> = inserted_at.parse()?;
        if Utc::now() - inserted_at > FRESHNESS_WINDOW {
            log::debug!("visits cache entry for '{url_percent_encoded}' is stale, forcing refresh");
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Insert or replace the cached visits for `url`, stamping the current
    /// time as `insertion_time`.
    pub async fn set(&self, url_percent_encoded: &str, visits: Vec<Visit>) -> anyhow::Result<()> {
        let key = url_percent_encoded.to_owned();
        let json = serde_json::to_string(&visits)?;
        let now = Utc::now().to_rfc3339();
        self.db
            .with(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO visits_cache (url, metadata, insertion_time) VALUES (?1, ?2, ?3)",
                    params![key, json, now],
                )
            })
            .await?;
        Ok(())
    }

    /// All origin URLs with a (possibly stale) cached visit row, used to
    /// enumerate `origin/` (§4.4.3). Staleness doesn't hide an entry from
    /// this listing — only [`get`](Self::get) enforces the freshness
    /// window — since the directory itself should still show origins that
    /// are due for a refresh.
    pub async fn cached_urls(&self) -> anyhow::Result<Vec<String>> {
        self.db
            .with(|conn| {
                let mut stmt = conn.prepare("SELECT url FROM visits_cache")?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn round_trips_visits() {
        let store = Store::open_in_memory("visits-cache-test").unwrap();
        let cache = store.visits();
        let url = "https%3A%2F%2Fgithub.com%2Fexample%2Frepo";
        assert!(cache.get(url).await.unwrap().is_none());

        let visits = vec![Visit {
            date: Utc::now(),
            origin: "https://github.com/example/repo".into(),
            snapshot: None,
        }];
        cache.set(url, visits.clone()).await.unwrap();

        let got = cache.get(url).await.unwrap().unwrap();
        assert_eq!(got, visits);
        assert_eq!(cache.cached_urls().await.unwrap(), vec![url.to_owned()]);
    }

    #[tokio::test]
    async fn stale_entry_is_a_miss() {
        let store = Store::open_in_memory("visits-cache-stale-test").unwrap();
        let cache = store.visits();
        let url = "https%3A%2F%2Fgithub.com%2Fexample%2Frepo";
        let stale = Utc::now() - Duration::hours(25);
        let json = serde_json::to_string(&Vec::<Visit>::new()).unwrap();
        store
            .metadata_db()
            .with(move |conn| {
                conn.execute(
                    "INSERT INTO visits_cache (url, metadata, insertion_time) VALUES (?1, ?2, ?3)",
                    params![url, json, stale.to_rfc3339()],
                )
            })
            .await
            .unwrap();

        assert!(cache.get(url).await.unwrap().is_none());
    }
}
