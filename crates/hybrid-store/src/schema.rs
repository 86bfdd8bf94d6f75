//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Documents table
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    document_type TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(document_type);

-- Declared dimension per vector space
CREATE TABLE IF NOT EXISTS vector_spaces (
    space TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL
);

-- Dense vectors: little-endian f32 blob, one per document
CREATE TABLE IF NOT EXISTS dense_vectors (
    document_id INTEGER PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
    vector BLOB NOT NULL
);

-- Sparse vectors: (u32 column, f32 weight) pairs, one row per document
CREATE TABLE IF NOT EXISTS sparse_vectors (
    document_id INTEGER PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
    nnz INTEGER NOT NULL,
    vector BLOB NOT NULL
);

-- Index lifecycle and fitted vocabulary
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;
