//! SQLite Fragment Store with Connection Pooling
//!
//! - Connection pooling via r2d2
//! - Schema bootstrap with version tracking
//! - WAL mode for concurrent readers while an ingester writes
//! - Embeddings stored as little-endian f32 BLOBs
//!
//! Queries run on the blocking pool so the job task never stalls on disk I/O.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use super::{FragmentStore, blob_to_vec, rank_by_similarity, vec_to_blob};
use crate::types::{
    EmbeddedFragment, Fragment, FragmentFilter, Result, ResultExt, ScoredFragment, SynthError,
};

/// Current schema version for `user_version`
const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS embeddings (
    id          TEXT PRIMARY KEY,
    dims        INTEGER NOT NULL,
    vector      BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS fragments (
    id           TEXT PRIMARY KEY,
    document_id  TEXT NOT NULL,
    page         INTEGER NOT NULL,
    char_offset  INTEGER,
    text         TEXT NOT NULL,
    embedding_id TEXT NOT NULL REFERENCES embeddings(id)
);

CREATE INDEX IF NOT EXISTS idx_fragments_document ON fragments(document_id);
"#;

const SELECT_FRAGMENTS: &str = "SELECT f.id, f.document_id, f.page, f.char_offset, f.text, f.embedding_id, e.vector
     FROM fragments f JOIN embeddings e ON e.id = f.embedding_id";

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    pub fn with_max_size(max_size: u32) -> Self {
        Self {
            max_size: max_size.max(1),
            ..Self::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout_secs: 30,
        }
    }
}

/// Pooled SQLite fragment store
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(|e| SynthError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        info!(path = %path.as_ref().display(), "Opened fragment store");
        Ok(store)
    }

    /// Open an in-memory store for tests or scratch use
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        // One connection: every connection to :memory: is a separate database
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| SynthError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            SynthError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(SynthError::Storage(format!(
                "Fragment store schema version {} is newer than supported {}",
                version, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize fragment schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("Failed to set schema version")?;
        Ok(())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Insert or update a fragment and its embedding
    pub fn insert_fragment(&self, fragment: &EmbeddedFragment) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;
        Self::upsert(&tx, fragment)?;
        tx.commit().with_context("Failed to commit fragment")?;
        Ok(())
    }

    /// Insert many fragments in one transaction
    pub fn insert_fragments(&self, fragments: &[EmbeddedFragment]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;
        for fragment in fragments {
            Self::upsert(&tx, fragment)?;
        }
        tx.commit().with_context("Failed to commit fragments")?;
        debug!(count = fragments.len(), "Inserted fragments");
        Ok(fragments.len())
    }

    fn upsert(conn: &Connection, ef: &EmbeddedFragment) -> Result<()> {
        let f = &ef.fragment;
        conn.execute(
            "INSERT INTO embeddings (id, dims, vector) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET dims = excluded.dims, vector = excluded.vector",
            params![f.embedding_id, ef.embedding.len() as i64, vec_to_blob(&ef.embedding)],
        )?;
        conn.execute(
            "INSERT INTO fragments (id, document_id, page, char_offset, text, embedding_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                page = excluded.page,
                char_offset = excluded.char_offset,
                text = excluded.text,
                embedding_id = excluded.embedding_id",
            params![f.id, f.document_id, f.page, f.offset, f.text, f.embedding_id],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM fragments", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Look up one fragment by id
    pub fn get(&self, id: &str) -> Result<Option<EmbeddedFragment>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE f.id = ?1", SELECT_FRAGMENTS);
        Ok(conn.query_row(&sql, [id], Self::row_to_fragment).optional()?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn row_to_fragment(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmbeddedFragment> {
        let blob: Vec<u8> = row.get(6)?;
        Ok(EmbeddedFragment {
            fragment: Fragment {
                id: row.get(0)?,
                document_id: row.get(1)?,
                page: row.get(2)?,
                offset: row.get(3)?,
                text: row.get(4)?,
                embedding_id: row.get(5)?,
            },
            embedding: blob_to_vec(&blob),
        })
    }

    fn query_blocking(&self, filter: &FragmentFilter) -> Result<Vec<EmbeddedFragment>> {
        let conn = self.conn()?;
        let mut sql = SELECT_FRAGMENTS.to_string();
        let mut values: Vec<String> = Vec::new();

        if let Some(ids) = &filter.document_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = (1..=ids.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" WHERE f.document_id IN ({})", placeholders));
            values.extend(ids.iter().cloned());
        }
        sql.push_str(" ORDER BY f.rowid");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_fragment)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| SynthError::Storage(format!("Store task failed: {}", e)))?
    }
}

#[async_trait]
impl FragmentStore for SqliteStore {
    async fn query_fragments(&self, filter: &FragmentFilter) -> Result<Vec<EmbeddedFragment>> {
        let filter = filter.clone();
        self.run_blocking(move |store| store.query_blocking(&filter))
            .await
    }

    async fn similarity(&self, query: &[f32], k: usize) -> Result<Vec<ScoredFragment>> {
        let query = query.to_vec();
        self.run_blocking(move |store| {
            let all = store.query_blocking(&FragmentFilter::all())?;
            Ok(rank_by_similarity(&query, all.iter(), k))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ef(id: &str, doc: &str, page: u32, v: Vec<f32>) -> EmbeddedFragment {
        EmbeddedFragment::new(Fragment::new(id, doc, page, format!("text of {}", id)), v)
    }

    #[tokio::test]
    async fn test_insert_and_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("nested/fragments.db")).unwrap();

        let with_offset = EmbeddedFragment::new(
            Fragment::new("b", "doc2", 7, "offset text").with_offset(120),
            vec![0.0, 1.0],
        );
        store
            .insert_fragments(&[ef("a", "doc1", 1, vec![1.0, 0.0]), with_offset.clone()])
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
        let all = store.query_fragments(&FragmentFilter::all()).await.unwrap();
        assert_eq!(all[0].id(), "a");
        assert_eq!(all[1], with_offset);
    }

    #[tokio::test]
    async fn test_document_filter_and_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_fragments(&[
                ef("1", "x", 1, vec![1.0]),
                ef("2", "y", 1, vec![1.0]),
                ef("3", "x", 2, vec![1.0]),
            ])
            .unwrap();

        let x = store
            .query_fragments(&FragmentFilter::documents(["x"]))
            .await
            .unwrap();
        assert_eq!(x.iter().map(|f| f.id()).collect::<Vec<_>>(), vec!["1", "3"]);

        let limited = store
            .query_fragments(&FragmentFilter::all().with_limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        let none = store
            .query_fragments(&FragmentFilter::documents(Vec::<String>::new()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_similarity_search() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_fragments(&[
                ef("east", "d", 1, vec![1.0, 0.0]),
                ef("north", "d", 1, vec![0.0, 1.0]),
                ef("northeast", "d", 1, vec![0.7, 0.7]),
            ])
            .unwrap();

        let hits = store.similarity(&[0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits[0].fragment.id, "east");
        assert_eq!(hits[1].fragment.id, "northeast");
    }

    #[test]
    fn test_upsert_keeps_single_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_fragment(&ef("a", "d", 1, vec![1.0])).unwrap();
        store.insert_fragment(&ef("a", "d", 2, vec![2.0])).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let got = store.get("a").unwrap().unwrap();
        assert_eq!(got.fragment.page, 2);
        assert_eq!(got.embedding, vec![2.0]);
        assert!(store.get("missing").unwrap().is_none());
    }
}
