//! `history_graph` (§4.3): persistent `(src, dst)` ancestry edges with a
//! `unique(src, dst)` constraint, shared with [`crate::metadata::MetadataCache`]
//! so by-date history shards (§4.4.12) can be computed by a single join
//! instead of fetching each ancestor's metadata individually.

use rusqlite::params;
use swhid::Swhid;

use crate::db::Db;

pub(crate) fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS history_graph (
            src TEXT NOT NULL,
            dst TEXT NOT NULL,
            UNIQUE(src, dst)
        );
        CREATE INDEX IF NOT EXISTS history_graph_src_idx ON history_graph(src);",
    )
}

/// Persistent revision ancestry graph.
#[derive(Clone)]
pub struct HistoryCache {
    db: Db,
}

impl HistoryCache {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert every edge, ignoring ones already present. `unique(src, dst)`
    /// makes two concurrent loads of the same revision's history
    /// idempotent (§5 "Concurrent-build safety").
    pub async fn set(&self, edges: Vec<(Swhid, Swhid)>) -> anyhow::Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        self.db
            .with(move |conn| {
                let tx = conn.unchecked_transaction()?;
                {
                    let mut stmt =
                        tx.prepare("INSERT OR IGNORE INTO history_graph (src, dst) VALUES (?1, ?2)")?;
                    for (src, dst) in &edges {
                        stmt.execute(params![src.to_string(), dst.to_string()])?;
                    }
                }
                tx.commit()
            })
            .await?;
        Ok(())
    }

    /// Whether any edge starting at `rev` has been recorded, i.e. whether
    /// its history has ever been loaded.
    pub async fn has_history(&self, rev: Swhid) -> anyhow::Result<bool> {
        let key = rev.to_string();
        self.db
            .with(move |conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM history_graph WHERE src = ?1)",
                    params![key],
                    |row| row.get::<_, bool>(0),
                )
            })
            .await
            .map_err(anyhow::Error::from)
    }

    /// The recursive closure of ancestors of `rev`, skipping `rev` itself,
    /// ordered by BFS distance (a stand-in for reverse-topological order
    /// when the graph isn't a simple chain — see DESIGN.md).
    pub async fn ancestors(&self, rev: Swhid) -> anyhow::Result<Vec<Swhid>> {
        let key = rev.to_string();
        let rows: Vec<String> = self
            .db
            .with(move |conn| {
                let mut stmt = conn.prepare(
                    "WITH RECURSIVE anc(node, depth) AS (
                        SELECT dst, 1 FROM history_graph WHERE src = ?1
                        UNION
                        SELECT h.dst, a.depth + 1 FROM history_graph h JOIN anc a ON h.src = a.node
                    )
                    SELECT node FROM anc GROUP BY node ORDER BY MIN(depth), node",
                )?;
                let rows = stmt
                    .query_map(params![key], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows.into_iter().filter_map(|s| s.parse().ok()).collect())
    }

    /// Ancestors of `rev` whose metadata is already cached and whose
    /// `date_prefix` starts with `prefix`, paired with the full sharded
    /// path (`<date_prefix><swhid>`) used to build `by-date/` shards
    /// (§4.4.12). Only cached ancestors appear — this is what lets
    /// `by-date/` show a partial view while the background prefetch is
    /// still running.
    pub async fn ancestors_with_date_prefix(
        &self,
        rev: Swhid,
        prefix: &str,
    ) -> anyhow::Result<Vec<(Swhid, String)>> {
        let key = rev.to_string();
        let like_pattern = format!("{prefix}%");
        let rows: Vec<(String, String)> = self
            .db
            .with(move |conn| {
                let mut stmt = conn.prepare(
                    "WITH RECURSIVE anc(node) AS (
                        SELECT dst FROM history_graph WHERE src = ?1
                        UNION
                        SELECT h.dst FROM history_graph h JOIN anc a ON h.src = a.node
                    )
                    SELECT anc.node, metadata_cache.date
                    FROM anc
                    JOIN metadata_cache ON metadata_cache.swhid = anc.node
                    WHERE metadata_cache.date IS NOT NULL AND metadata_cache.date LIKE ?2",
                )?;
                let rows = stmt
                    .query_map(params![key, like_pattern], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(swhid_str, date)| {
                let swhid: Swhid = swhid_str.parse().ok()?;
                Some((swhid, format!("{date}{swhid}")))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::TimeZone;
    use swhfs_backend::{Metadata, MetadataBody, RevisionMeta};

    fn sw(s: &str) -> Swhid {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn closure_matches_edge_set() {
        let store = Store::open_in_memory("history-cache-test").unwrap();
        let cache = store.history();

        let a = sw("swh:1:rev:0000000000000000000000000000000000000001");
        let b = sw("swh:1:rev:0000000000000000000000000000000000000002");
        let c = sw("swh:1:rev:0000000000000000000000000000000000000003");

        cache.set(vec![(a, b), (b, c)]).await.unwrap();

        let mut ancestors = cache.ancestors(a).await.unwrap();
        ancestors.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(ancestors, expected);
        assert!(cache.has_history(a).await.unwrap());
        assert!(!cache.has_history(c).await.unwrap());
    }

    #[tokio::test]
    async fn set_is_idempotent_under_duplicate_edges() {
        let store = Store::open_in_memory("history-cache-idempotent-test").unwrap();
        let cache = store.history();
        let a = sw("swh:1:rev:0000000000000000000000000000000000000001");
        let b = sw("swh:1:rev:0000000000000000000000000000000000000002");

        cache.set(vec![(a, b)]).await.unwrap();
        cache.set(vec![(a, b)]).await.unwrap();

        assert_eq!(cache.ancestors(a).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn by_date_join_only_surfaces_cached_ancestors() {
        let store = Store::open_in_memory("history-cache-date-test").unwrap();
        let history = store.history();
        let metadata = store.metadata();

        let a = sw("swh:1:rev:0000000000000000000000000000000000000001");
        let b = sw("swh:1:rev:0000000000000000000000000000000000000002");
        let c = sw("swh:1:rev:0000000000000000000000000000000000000003");
        history.set(vec![(a, b), (a, c)]).await.unwrap();

        // Only b's metadata (and hence date_prefix) is cached so far.
        metadata
            .set(Metadata {
                swhid: b,
                body: MetadataBody::Revision(RevisionMeta {
                    id: b,
                    directory: sw("swh:1:dir:0000000000000000000000000000000000000004"),
                    parents: vec![],
                    author: swhfs_backend::MaybeText::Text(String::new()),
                    committer: swhfs_backend::MaybeText::Text(String::new()),
                    message: swhfs_backend::MaybeText::Text(String::new()),
                    date: chrono::Utc
                        .with_ymd_and_hms(2020, 8, 16, 0, 0, 0)
                        .single(),
                    committer_date: None,
                }),
                raw: serde_json::Value::Null,
            })
            .await
            .unwrap();

        let shard = history.ancestors_with_date_prefix(a, "").await.unwrap();
        assert_eq!(shard.len(), 1);
        assert_eq!(shard[0].0, b);
        assert!(shard[0].1.starts_with("2020/08/16/"));
    }
}
