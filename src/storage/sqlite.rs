//! SQLite persistence for documents and their embedding vectors

use std::path::Path;

use half::f16;
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};

use crate::core::{Document, DocumentKind};
use crate::error::{Result, StashError};
use crate::search::store::{EmbeddingRecord, VectorStorage};
use crate::storage::migrations;

/// SQLite database wrapper
///
/// The connection is serialized behind a mutex so writes from concurrent
/// logical callers never interleave mid-statement.
pub struct Database {
    conn: Mutex<Connection>,
    schema_version: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    /// Open a transient in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Ok(())
    }

    /// Current schema version after migrations.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn upsert_document(&self, doc: &Document) -> Result<()> {
        let (kind, author_name, author_handle, media_url) = match &doc.kind {
            DocumentKind::Page => ("page", None, None, None),
            DocumentKind::Post {
                author_name,
                author_handle,
                media_url,
            } => (
                "post",
                Some(author_name.as_str()),
                Some(author_handle.as_str()),
                media_url.as_deref(),
            ),
        };

        self.conn.lock().execute(
            "INSERT INTO documents (
                id, title, url, excerpt, content, kind,
                author_name, author_handle, media_url, favicon, image, saved_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title=excluded.title,
                url=excluded.url,
                excerpt=excluded.excerpt,
                content=excluded.content,
                kind=excluded.kind,
                author_name=excluded.author_name,
                author_handle=excluded.author_handle,
                media_url=excluded.media_url,
                favicon=excluded.favicon,
                image=excluded.image,
                saved_at=excluded.saved_at",
            params![
                doc.id,
                doc.title,
                doc.url,
                doc.excerpt,
                doc.text,
                kind,
                author_name,
                author_handle,
                media_url,
                doc.favicon,
                doc.image,
                doc.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, url, excerpt, content, kind,
                    author_name, author_handle, media_url, favicon, image, saved_at
             FROM documents WHERE id = ?",
        )?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(document_from_row(row)?));
        }
        Ok(None)
    }

    /// All saved documents, newest first.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, url, excerpt, content, kind,
                    author_name, author_handle, media_url, favicon, image, saved_at
             FROM documents ORDER BY saved_at DESC",
        )?;
        let rows = stmt.query_map([], document_from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn count_documents(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Delete a document and its embedding record in one transaction.
    ///
    /// Returns whether a document row was removed. Deleting an absent id is
    /// not an error.
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM embeddings WHERE document_id = ?", [id])?;
        let deleted = tx.execute("DELETE FROM documents WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Remove every document and every embedding together.
    pub fn clear_documents(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM embeddings", [])?;
        tx.execute("DELETE FROM documents", [])?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_embedding(&self, record: &EmbeddingRecord) -> Result<()> {
        if record.vector.len() != record.dims {
            return Err(StashError::Serialization(format!(
                "embedding dims mismatch: expected {}, got {}",
                record.dims,
                record.vector.len()
            )));
        }

        let encoded = encode_embedding_f16(&record.vector);
        let computed_at = if record.computed_at.is_empty() {
            chrono::Utc::now().to_rfc3339()
        } else {
            record.computed_at.clone()
        };

        self.conn.lock().execute(
            "INSERT INTO embeddings (
                document_id, vector, dims, backend, content_hash, computed_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(document_id) DO UPDATE SET
                vector=excluded.vector,
                dims=excluded.dims,
                backend=excluded.backend,
                content_hash=excluded.content_hash,
                computed_at=excluded.computed_at",
            params![
                record.document_id,
                encoded,
                record.dims as i64,
                record.backend,
                record.content_hash,
                computed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_embedding(&self, document_id: &str) -> Result<Option<EmbeddingRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT document_id, vector, dims, backend, content_hash, computed_at
             FROM embeddings WHERE document_id = ?",
        )?;
        let mut rows = stmt.query([document_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(embedding_from_row(row)?));
        }
        Ok(None)
    }

    pub fn list_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT document_id, vector, dims, backend, content_hash, computed_at
             FROM embeddings",
        )?;
        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            results.push(embedding_from_row(row)?);
        }
        Ok(results)
    }

    pub fn delete_embedding(&self, document_id: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM embeddings WHERE document_id = ?", [document_id])?;
        Ok(())
    }

    pub fn clear_embeddings(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM embeddings", [])?;
        Ok(())
    }
}

impl VectorStorage for Database {
    fn load_all(&self) -> Result<Vec<EmbeddingRecord>> {
        self.list_embeddings()
    }

    fn set(&self, record: &EmbeddingRecord) -> Result<()> {
        self.upsert_embedding(record)
    }

    fn remove(&self, document_id: &str) -> Result<()> {
        self.delete_embedding(document_id)
    }

    fn clear(&self) -> Result<()> {
        self.clear_embeddings()
    }
}

fn document_from_row(row: &Row<'_>) -> std::result::Result<Document, rusqlite::Error> {
    let kind_tag: String = row.get(5)?;
    let kind = if kind_tag == "post" {
        DocumentKind::Post {
            author_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            author_handle: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            media_url: row.get(8)?,
        }
    } else {
        DocumentKind::Page
    };

    let saved_at: String = row.get(11)?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&saved_at)
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                11,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?
        .with_timezone(&chrono::Utc);

    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        excerpt: row.get(3)?,
        text: row.get(4)?,
        timestamp,
        kind,
        favicon: row.get(9)?,
        image: row.get(10)?,
    })
}

fn embedding_from_row(row: &Row<'_>) -> Result<EmbeddingRecord> {
    let document_id: String = row.get(0)?;
    let blob: Vec<u8> = row.get(1)?;
    let dims: i64 = row.get(2)?;
    let backend: String = row.get(3)?;
    let content_hash: Option<String> = row.get(4)?;
    let computed_at: String = row.get(5)?;

    let dims = if dims <= 0 { 0 } else { dims as usize };
    let vector = decode_embedding_f16(&blob, dims)?;

    Ok(EmbeddingRecord {
        document_id,
        vector,
        dims,
        backend,
        content_hash,
        computed_at,
    })
}

fn encode_embedding_f16(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for value in values {
        let bits = f16::from_f32(*value).to_bits();
        out.extend_from_slice(&bits.to_le_bytes());
    }
    out
}

fn decode_embedding_f16(bytes: &[u8], dims: usize) -> Result<Vec<f32>> {
    let expected = dims.saturating_mul(2);
    if bytes.len() != expected {
        return Err(StashError::Serialization(format!(
            "embedding blob length mismatch: expected {}, got {}",
            expected,
            bytes.len()
        )));
    }

    let mut out = Vec::with_capacity(dims);
    for chunk in bytes.chunks_exact(2) {
        let bits = u16::from_le_bytes([chunk[0], chunk[1]]);
        out.push(f16::from_bits(bits).to_f32());
    }
    Ok(out)
}
