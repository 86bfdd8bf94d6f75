//! SQLite-based storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use hybrid_core::{
    cosine_similarity, l2_norm, DatabaseConfig, DenseVector, Document, DocumentId, HybridError,
    IndexState, NewDocument, Result, SparseVector, Stats, Store, VectorSpace, Vocabulary,
};

use crate::codec::{
    dense_from_bytes, dense_to_bytes, sparse_cosine, sparse_from_bytes, sparse_to_bytes,
};
use crate::schema::SCHEMA;

const STATE_KEY: &str = "state";
const VOCABULARY_KEY: &str = "vocabulary";
const VOCABULARY_FINGERPRINT_KEY: &str = "vocabulary_fingerprint";
const DENSE_MODEL_KEY: &str = "dense_model";

/// SQLite-based store implementation.
///
/// One connection behind a blocking Mutex; every committed write is visible to
/// the next read. Full scans run on the blocking thread pool.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database at the given path with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = DatabaseConfig {
            path: path.as_ref().to_path_buf(),
            ..DatabaseConfig::default()
        };
        Self::open_with_config(&config)
    }

    /// Open or create the database described by `config`.
    pub fn open_with_config(config: &DatabaseConfig) -> Result<Self> {
        let path = config.path.as_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| HybridError::store_unavailable(format!("Failed to open database: {}", e)))?;

        Self::init(conn, config, path)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            HybridError::store_unavailable(format!("Failed to open in-memory database: {}", e))
        })?;

        let config = DatabaseConfig {
            wal_mode: false,
            ..DatabaseConfig::default()
        };
        Self::init(conn, &config, Path::new(":memory:"))
    }

    /// Initialize the store with a connection.
    fn init(conn: Connection, config: &DatabaseConfig, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn, config)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| HybridError::database(format!("Failed to initialize schema: {}", e)))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configure SQLite connection for optimal performance.
    fn configure_connection(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
        let journal_mode = if config.wal_mode { "WAL" } else { "DELETE" };
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = {};
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = {};
            PRAGMA busy_timeout = {};
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
            journal_mode, config.cache_size, config.busy_timeout_ms
        ))
        .map_err(|e| {
            HybridError::store_unavailable(format!("Failed to configure connection: {}", e))
        })?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HybridError::store_unavailable(e.to_string()))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| HybridError::store_unavailable(e.to_string()))?;
        f(&mut conn)
    }

    /// Run an operation on the blocking thread pool, so callers awaiting it
    /// (and any timeout around them) are not stalled by a long scan.
    async fn with_conn_blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| HybridError::store_unavailable(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| HybridError::internal(format!("Blocking store task failed: {}", e)))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    // Document operations

    async fn insert_document(&self, doc: &NewDocument) -> Result<DocumentId> {
        self.with_conn(|conn| {
            let id = Self::insert_document_row(conn, doc)?;
            debug!("Inserted document: {}", id);
            Ok(id)
        })
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        self.with_conn(|conn| Self::fetch_document(conn, id))
    }

    async fn get_documents(&self, ids: &[DocumentId]) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let mut documents = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(doc) = Self::fetch_document(conn, *id)? {
                    documents.push(doc);
                }
            }
            Ok(documents)
        })
    }

    async fn list_documents(&self, limit: u32, offset: u32) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, title, content, source, document_type, created_at
                    FROM documents
                    ORDER BY id
                    LIMIT ?1 OFFSET ?2
                    "#,
                )
                .map_err(|e| HybridError::database(e.to_string()))?;

            let documents = stmt
                .query_map(params![limit, offset], Self::row_to_document)
                .map_err(|e| HybridError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| HybridError::database(e.to_string()))?;

            Ok(documents)
        })
    }

    // Vector space operations

    async fn declare_space(&self, space: VectorSpace, dimension: usize) -> Result<()> {
        self.with_conn(|conn| {
            match Self::declared_dimension(conn, space)? {
                Some(existing) if existing != dimension => Err(HybridError::DimensionMismatch {
                    space,
                    expected: existing,
                    actual: dimension,
                }),
                Some(_) => Ok(()),
                None => {
                    conn.execute(
                        "INSERT INTO vector_spaces (space, dimension) VALUES (?1, ?2)",
                        params![space.as_str(), dimension as i64],
                    )
                    .map_err(|e| HybridError::database(format!("Failed to declare space: {}", e)))?;
                    debug!("Declared {} space with dimension {}", space, dimension);
                    Ok(())
                }
            }
        })
    }

    async fn space_dimension(&self, space: VectorSpace) -> Result<Option<usize>> {
        self.with_conn(|conn| Self::declared_dimension(conn, space))
    }

    async fn put_vector(&self, id: DocumentId, space: VectorSpace, vector: &[f32]) -> Result<()> {
        self.with_conn(|conn| Self::insert_vector_row(conn, id, space, vector))
    }

    async fn insert_indexed_document(
        &self,
        doc: &NewDocument,
        dense: &DenseVector,
        sparse: &SparseVector,
    ) -> Result<DocumentId> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| HybridError::database(e.to_string()))?;

            let id = Self::insert_document_row(&tx, doc)?;
            Self::insert_vector_row(&tx, id, VectorSpace::Dense, dense.as_slice())?;
            Self::insert_vector_row(&tx, id, VectorSpace::Sparse, sparse.as_slice())?;

            tx.commit()
                .map_err(|e| HybridError::database(e.to_string()))?;

            debug!("Indexed document {} (sparse nnz={})", id, sparse.nnz());
            Ok(id)
        })
    }

    // Search operations

    async fn similarities(
        &self,
        space: VectorSpace,
        query: &[f32],
    ) -> Result<Vec<(DocumentId, f32)>> {
        let query = query.to_vec();
        self.with_conn_blocking(move |conn| Self::scan(conn, space, &query)).await
    }

    async fn nearest(
        &self,
        space: VectorSpace,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(DocumentId, f32)>> {
        let query = query.to_vec();
        let mut scored = self
            .with_conn_blocking(move |conn| Self::scan(conn, space, &query))
            .await?;

        // Scan is ascending by id; the stable sort keeps that order among ties.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored)
    }

    // Fit state and lifecycle

    async fn save_vocabulary(&self, vocabulary: &Vocabulary) -> Result<()> {
        let json = serde_json::to_string(vocabulary)?;
        let fingerprint = vocabulary.fingerprint();

        self.with_conn(|conn| {
            Self::put_meta(conn, VOCABULARY_KEY, &json)?;
            Self::put_meta(conn, VOCABULARY_FINGERPRINT_KEY, &fingerprint)?;
            debug!(
                "Saved vocabulary: {} terms, fingerprint {}",
                vocabulary.len(),
                fingerprint
            );
            Ok(())
        })
    }

    async fn load_vocabulary(&self) -> Result<Option<Vocabulary>> {
        let json = self.with_conn(|conn| Self::get_meta(conn, VOCABULARY_KEY))?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn vocabulary_fingerprint(&self) -> Result<Option<String>> {
        self.with_conn(|conn| Self::get_meta(conn, VOCABULARY_FINGERPRINT_KEY))
    }

    async fn save_dense_model(&self, model_id: &str) -> Result<()> {
        self.with_conn(|conn| Self::put_meta(conn, DENSE_MODEL_KEY, model_id))
    }

    async fn dense_model(&self) -> Result<Option<String>> {
        self.with_conn(|conn| Self::get_meta(conn, DENSE_MODEL_KEY))
    }

    async fn set_index_state(&self, state: IndexState) -> Result<()> {
        self.with_conn(|conn| {
            Self::put_meta(conn, STATE_KEY, state.as_str())?;
            debug!("Index state -> {}", state);
            Ok(())
        })
    }

    async fn index_state(&self) -> Result<IndexState> {
        let state = self.with_conn(|conn| Self::get_meta(conn, STATE_KEY))?;
        match state {
            Some(s) => s.parse(),
            None => Ok(IndexState::Empty),
        }
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| HybridError::database(e.to_string()))?;

            tx.execute_batch(
                r#"
                DELETE FROM sparse_vectors;
                DELETE FROM dense_vectors;
                DELETE FROM documents;
                DELETE FROM vector_spaces;
                DELETE FROM index_meta;
                DELETE FROM sqlite_sequence WHERE name = 'documents';
                "#,
            )
            .map_err(|e| HybridError::database(format!("Failed to clear store: {}", e)))?;

            tx.commit()
                .map_err(|e| HybridError::database(e.to_string()))?;

            info!("Cleared all documents and vectors");
            Ok(())
        })
    }

    // Stats

    async fn get_stats(&self) -> Result<Stats> {
        let vocabulary_terms = self
            .load_vocabulary()
            .await?
            .map(|v| v.len())
            .unwrap_or(0);
        let state = self.index_state().await?;

        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64> {
                conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                    .map(|n| n as u64)
                    .map_err(|e| HybridError::database(e.to_string()))
            };

            let documents = count("SELECT COUNT(*) FROM documents")?;
            let dense_vectors = count("SELECT COUNT(*) FROM dense_vectors")?;
            let sparse_vectors = count("SELECT COUNT(*) FROM sparse_vectors")?;

            // Get page count and page size to estimate storage
            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(Stats {
                documents,
                dense_vectors,
                sparse_vectors,
                dense_dimension: Self::declared_dimension(conn, VectorSpace::Dense)?,
                sparse_dimension: Self::declared_dimension(conn, VectorSpace::Sparse)?,
                vocabulary_terms,
                state,
                storage_bytes: page_count * page_size,
            })
        })
    }
}

// Helper methods
impl SqliteStore {
    fn insert_document_row(conn: &Connection, doc: &NewDocument) -> Result<DocumentId> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        conn.execute(
            r#"
            INSERT INTO documents (title, content, source, document_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![doc.title, doc.content, doc.source, doc.document_type, now],
        )
        .map_err(|e| HybridError::database(format!("Failed to insert document: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    fn insert_vector_row(
        conn: &Connection,
        id: DocumentId,
        space: VectorSpace,
        vector: &[f32],
    ) -> Result<()> {
        let expected = Self::declared_dimension(conn, space)?.ok_or_else(|| {
            HybridError::invalid_argument(format!("{} space has no declared dimension", space))
        })?;
        if vector.len() != expected {
            return Err(HybridError::DimensionMismatch {
                space,
                expected,
                actual: vector.len(),
            });
        }

        let result = match space {
            VectorSpace::Dense => conn.execute(
                "INSERT INTO dense_vectors (document_id, vector) VALUES (?1, ?2)",
                params![id, dense_to_bytes(vector)],
            ),
            VectorSpace::Sparse => {
                let (nnz, bytes) = sparse_to_bytes(vector);
                conn.execute(
                    "INSERT INTO sparse_vectors (document_id, nnz, vector) VALUES (?1, ?2, ?3)",
                    params![id, nnz as i64, bytes],
                )
            }
        };

        result.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE constraint") {
                HybridError::VectorExists { id, space }
            } else if msg.contains("FOREIGN KEY constraint") {
                HybridError::DocumentNotFound { id }
            } else {
                HybridError::database(format!("Failed to insert {} vector: {}", space, e))
            }
        })?;

        Ok(())
    }

    /// Exact cosine scan over one space, ascending document id.
    fn scan(conn: &Connection, space: VectorSpace, query: &[f32]) -> Result<Vec<(DocumentId, f32)>> {
        let Some(expected) = Self::declared_dimension(conn, space)? else {
            return Ok(Vec::new());
        };
        if query.len() != expected {
            return Err(HybridError::DimensionMismatch {
                space,
                expected,
                actual: query.len(),
            });
        }

        let sql = match space {
            VectorSpace::Dense => "SELECT document_id, vector FROM dense_vectors ORDER BY document_id",
            VectorSpace::Sparse => {
                "SELECT document_id, vector FROM sparse_vectors ORDER BY document_id"
            }
        };

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| HybridError::database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, DocumentId>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(|e| HybridError::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| HybridError::database(e.to_string()))?;

        let query_norm = l2_norm(query);
        let mut scored = Vec::with_capacity(rows.len());
        for (id, blob) in rows {
            let similarity = match space {
                VectorSpace::Dense => cosine_similarity(&dense_from_bytes(&blob)?, query),
                VectorSpace::Sparse => sparse_cosine(&sparse_from_bytes(&blob)?, query, query_norm),
            };
            scored.push((id, similarity));
        }

        debug!("Scanned {} {} vectors", scored.len(), space);
        Ok(scored)
    }

    fn declared_dimension(conn: &Connection, space: VectorSpace) -> Result<Option<usize>> {
        conn.query_row(
            "SELECT dimension FROM vector_spaces WHERE space = ?1",
            params![space.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|d| d.map(|d| d as usize))
        .map_err(|e| HybridError::database(e.to_string()))
    }

    fn fetch_document(conn: &Connection, id: DocumentId) -> Result<Option<Document>> {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, title, content, source, document_type, created_at
                FROM documents WHERE id = ?1
                "#,
            )
            .map_err(|e| HybridError::database(e.to_string()))?;

        stmt.query_row(params![id], Self::row_to_document)
            .optional()
            .map_err(|e| HybridError::database(e.to_string()))
    }

    fn put_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| HybridError::database(e.to_string()))?;
        Ok(())
    }

    fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| HybridError::database(e.to_string()))
    }

    /// Convert a row to a Document.
    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        Ok(Document {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            source: row.get(3)?,
            document_type: row.get(4)?,
            created_at: row.get::<_, i64>(5)? as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, content: &str) -> NewDocument {
        NewDocument::new(title, content, "synthetic", "annual_report")
    }

    async fn store_with_spaces(dense: usize, sparse: usize) -> SqliteStore {
        let store = SqliteStore::open_memory().unwrap();
        store.declare_space(VectorSpace::Dense, dense).await.unwrap();
        store.declare_space(VectorSpace::Sparse, sparse).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.list_documents(10, 0).await.unwrap().is_empty());
        assert_eq!(store.index_state().await.unwrap(), IndexState::Empty);
    }

    #[tokio::test]
    async fn test_document_crud() {
        let store = SqliteStore::open_memory().unwrap();

        let first = store.insert_document(&doc("A", "revenue growth")).await.unwrap();
        let second = store.insert_document(&doc("B", "digital transformation")).await.unwrap();
        assert!(second > first);

        let retrieved = store.get_document(first).await.unwrap().unwrap();
        assert_eq!(retrieved.title, "A");
        assert_eq!(retrieved.source, "synthetic");

        // Order follows the requested ids; unknown ids are skipped
        let docs = store.get_documents(&[second, 999, first]).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, second);
        assert_eq!(docs[1].id, first);

        assert!(store.get_document(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_declare_space_dimension_is_fixed() {
        let store = store_with_spaces(3, 4).await;

        // Same dimension is idempotent
        store.declare_space(VectorSpace::Dense, 3).await.unwrap();

        let err = store.declare_space(VectorSpace::Dense, 5).await.unwrap_err();
        assert!(matches!(
            err,
            HybridError::DimensionMismatch { expected: 3, actual: 5, .. }
        ));
        assert_eq!(store.space_dimension(VectorSpace::Sparse).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_put_vector_rejects_wrong_dimension() {
        let store = store_with_spaces(3, 4).await;
        let id = store.insert_document(&doc("A", "text")).await.unwrap();

        let err = store
            .put_vector(id, VectorSpace::Dense, &[1.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_put_vector_rejects_reinsertion() {
        let store = store_with_spaces(2, 2).await;
        let id = store.insert_document(&doc("A", "text")).await.unwrap();

        store.put_dense(id, &DenseVector::new(vec![1.0, 0.0])).await.unwrap();
        let err = store
            .put_dense(id, &DenseVector::new(vec![0.0, 1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::VectorExists { space: VectorSpace::Dense, .. }));
    }

    #[tokio::test]
    async fn test_put_vector_requires_document() {
        let store = store_with_spaces(2, 2).await;
        let err = store
            .put_sparse(42, &SparseVector::new(vec![1.0, 0.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::DocumentNotFound { id: 42 }));
    }

    #[tokio::test]
    async fn test_nearest_orders_by_similarity_then_id() {
        let store = store_with_spaces(2, 2).await;

        let a = store.insert_document(&doc("A", "a")).await.unwrap();
        let b = store.insert_document(&doc("B", "b")).await.unwrap();
        let c = store.insert_document(&doc("C", "c")).await.unwrap();

        store.put_dense(a, &DenseVector::new(vec![0.0, 1.0])).await.unwrap();
        store.put_dense(b, &DenseVector::new(vec![1.0, 0.0])).await.unwrap();
        store.put_dense(c, &DenseVector::new(vec![1.0, 0.0])).await.unwrap();

        let query = DenseVector::new(vec![1.0, 0.0]);
        let hits = store.nearest_dense(&query, 10).await.unwrap();

        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![b, c, a]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert!(hits[2].1.abs() < 1e-6);

        let top = store.nearest_dense(&query, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, b);
    }

    #[tokio::test]
    async fn test_sparse_scan_matches_cosine() {
        let store = store_with_spaces(2, 4).await;
        let id = store.insert_document(&doc("A", "a")).await.unwrap();
        let stored = SparseVector::new(vec![0.0, 3.0, 0.0, 4.0]);
        store.put_sparse(id, &stored).await.unwrap();

        let query = SparseVector::new(vec![0.0, 1.0, 1.0, 0.0]);
        let sims = store
            .similarities(VectorSpace::Sparse, query.as_slice())
            .await
            .unwrap();

        let expected = cosine_similarity(stored.as_slice(), query.as_slice());
        assert_eq!(sims.len(), 1);
        assert!((sims[0].1 - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let store = store_with_spaces(2, 4).await;
        let err = store
            .nearest(VectorSpace::Sparse, &[1.0, 0.0], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::DimensionMismatch { expected: 4, actual: 2, .. }));
    }

    #[tokio::test]
    async fn test_undeclared_space_searches_empty() {
        let store = SqliteStore::open_memory().unwrap();
        let hits = store.nearest(VectorSpace::Dense, &[1.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_insert_indexed_document_is_atomic() {
        let store = store_with_spaces(2, 3).await;

        let ok = store
            .insert_indexed_document(
                &doc("A", "a"),
                &DenseVector::new(vec![1.0, 0.0]),
                &SparseVector::new(vec![1.0, 0.0, 0.0]),
            )
            .await
            .unwrap();
        assert!(store.get_document(ok).await.unwrap().is_some());

        // Sparse vector has the wrong dimension: nothing from this call is kept
        let err = store
            .insert_indexed_document(
                &doc("B", "b"),
                &DenseVector::new(vec![0.0, 1.0]),
                &SparseVector::new(vec![1.0, 0.0]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::DimensionMismatch { .. }));

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.dense_vectors, 1);
        assert_eq!(stats.sparse_vectors, 1);
    }

    #[tokio::test]
    async fn test_vocabulary_and_state_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hybrid.db");

        let vocab = Vocabulary::new(
            vec!["growth".to_string(), "revenue".to_string()],
            vec![1.2, 1.4],
            true,
        )
        .unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            assert!(store.load_vocabulary().await.unwrap().is_none());
            store.save_vocabulary(&vocab).await.unwrap();
            store.set_index_state(IndexState::Ready).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let loaded = reopened.load_vocabulary().await.unwrap().unwrap();
        assert_eq!(loaded.fingerprint(), vocab.fingerprint());
        assert_eq!(
            reopened.vocabulary_fingerprint().await.unwrap(),
            Some(vocab.fingerprint())
        );
        assert_eq!(reopened.index_state().await.unwrap(), IndexState::Ready);
    }

    #[tokio::test]
    async fn test_dense_model_recorded_and_cleared() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.dense_model().await.unwrap().is_none());
        assert!(store.vocabulary_fingerprint().await.unwrap().is_none());

        store.save_dense_model("mock-hash-4").await.unwrap();
        assert_eq!(
            store.dense_model().await.unwrap().as_deref(),
            Some("mock-hash-4")
        );

        store.clear().await.unwrap();
        assert!(store.dense_model().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let store = store_with_spaces(2, 2).await;
        let id = store
            .insert_indexed_document(
                &doc("A", "a"),
                &DenseVector::new(vec![1.0, 0.0]),
                &SparseVector::new(vec![0.0, 1.0]),
            )
            .await
            .unwrap();
        store.set_index_state(IndexState::Ready).await.unwrap();

        store.clear().await.unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.dense_vectors, 0);
        assert_eq!(stats.dense_dimension, None);
        assert_eq!(stats.state, IndexState::Empty);

        // Ids restart after a full rebuild
        let again = store.insert_document(&doc("B", "b")).await.unwrap();
        assert_eq!(again, id);
    }
}
