//! SQLite storage implementation

use std::path::Path;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, OptionalExtension};
use serde::Serialize;
use crate::{Result, Error};
use crate::document::{Chunk, DocumentKind, IndexedDocument, ScoredChunk};
use crate::uri::ChunkUri;
use super::schema;

/// SQLite-backed storage for chunks and their embeddings
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let index = Self { conn };
        index.initialize_schema()?;
        Ok(index)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let index = Self { conn };
        index.initialize_schema()?;
        Ok(index)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Document Operations ==========

    /// Replace everything stored for a document in one transaction
    pub fn upsert_document(
        &mut self,
        doc: &IndexedDocument,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::Embedding(format!(
                "{} has {} chunks but {} embeddings",
                doc.key,
                chunks.len(),
                vectors.len()
            )));
        }

        let tx = self.conn.transaction()?;
        delete_document_rows(&tx, &doc.key)?;

        tx.execute(
            r#"
            INSERT INTO documents (key, kind, content_hash, characters, chunks, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.key,
                doc.kind.as_str(),
                doc.content_hash,
                doc.characters as i64,
                doc.chunks as i64,
                doc.indexed_at.to_rfc3339(),
            ],
        )?;

        {
            let mut insert_chunk = tx.prepare(
                "INSERT OR REPLACE INTO chunks (uri, source, chunk_index, text) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_vector = tx.prepare(
                "INSERT OR REPLACE INTO embeddings (uri, vector) VALUES (?1, ?2)",
            )?;

            for (chunk, vector) in chunks.iter().zip(vectors) {
                let uri = chunk.uri.to_uri_string();
                insert_chunk.execute(params![uri, chunk.source, chunk.chunk_index as i64, chunk.text])?;
                insert_vector.execute(params![uri, encode_vector(vector)])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a document and its chunks. Returns whether it existed.
    pub fn remove_document(&mut self, key: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let removed = delete_document_rows(&tx, key)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Get a document by key
    pub fn get_document(&self, key: &str) -> Result<Option<IndexedDocument>> {
        self.conn
            .query_row(
                "SELECT key, kind, content_hash, characters, chunks, indexed_at FROM documents WHERE key = ?1",
                [key],
                |row| self.row_to_document(row),
            )
            .optional()
            .map_err(Into::into)
    }

    /// All indexed documents, ordered by key
    pub fn documents(&self) -> Result<Vec<IndexedDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, kind, content_hash, characters, chunks, indexed_at FROM documents ORDER BY key",
        )?;

        let docs = stmt
            .query_map([], |row| self.row_to_document(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(docs)
    }

    fn row_to_document(&self, row: &rusqlite::Row) -> rusqlite::Result<IndexedDocument> {
        let kind_str: String = row.get(1)?;
        let indexed_at_str: String = row.get(5)?;

        let kind: DocumentKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let indexed_at = DateTime::parse_from_rfc3339(&indexed_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(IndexedDocument {
            key: row.get(0)?,
            kind,
            content_hash: row.get(2)?,
            characters: row.get::<_, i64>(3)? as usize,
            chunks: row.get::<_, i64>(4)? as usize,
            indexed_at,
        })
    }

    // ========== Chunk Operations ==========

    /// Chunks of one document in order
    pub fn chunks_for(&self, key: &str) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT uri, source, chunk_index, text FROM chunks WHERE source = ?1 ORDER BY chunk_index",
        )?;

        let chunks = stmt
            .query_map([key], |row| self.row_to_chunk(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(chunks)
    }

    /// Count all chunks
    pub fn count_chunks(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count all documents
    pub fn count_documents(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Helper to convert a row to a Chunk
    fn row_to_chunk(&self, row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
        let uri_str: String = row.get(0)?;

        let uri = ChunkUri::parse(&uri_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Chunk {
            uri,
            source: row.get(1)?,
            chunk_index: row.get::<_, i64>(2)? as usize,
            text: row.get(3)?,
        })
    }

    // ========== Embedding Operations ==========

    /// Get an embedding by URI
    pub fn get_embedding(&self, uri: &ChunkUri) -> Result<Option<Vec<f32>>> {
        let result: Option<Vec<u8>> = self.conn
            .query_row(
                "SELECT vector FROM embeddings WHERE uri = ?1",
                [uri.to_uri_string()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(result.map(|blob| decode_vector(&blob)))
    }

    /// Count embeddings
    pub fn count_embeddings(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Brute-force cosine scan over every stored chunk, best first
    pub fn search_by_vector(&self, query_vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.uri, c.source, c.chunk_index, c.text, e.vector
            FROM chunks c
            JOIN embeddings e ON e.uri = c.uri
            ORDER BY c.source, c.chunk_index
            "#,
        )?;

        let candidates = stmt.query_map([], |row| {
            let chunk = self.row_to_chunk(row)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((chunk, decode_vector(&blob)))
        })?;

        let mut scored = Vec::new();
        for candidate in candidates {
            let (chunk, vector) = candidate?;
            let score = cosine_similarity(query_vector, &vector);
            scored.push(ScoredChunk::new(chunk, score));
        }

        // Sort by score descending
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored)
    }

    // ========== Bulk Operations ==========

    /// Delete all data (for `index --rebuild`)
    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM embeddings", [])?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.execute("DELETE FROM documents", [])?;
        tx.commit()?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.count_documents()?,
            chunks: self.count_chunks()?,
            embeddings: self.count_embeddings()?,
        })
    }
}

fn delete_document_rows(conn: &Connection, key: &str) -> Result<bool> {
    conn.execute(
        "DELETE FROM embeddings WHERE uri IN (SELECT uri FROM chunks WHERE source = ?1)",
        [key],
    )?;
    conn.execute("DELETE FROM chunks WHERE source = ?1", [key])?;
    let removed = conn.execute("DELETE FROM documents WHERE key = ?1", [key])?;
    Ok(removed > 0)
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub embeddings: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Index Statistics:")?;
        writeln!(f, "  Documents: {}", self.documents)?;
        writeln!(f, "  Chunks: {}", self.chunks)?;
        writeln!(f, "  Embeddings: {}", self.embeddings)
    }
}
