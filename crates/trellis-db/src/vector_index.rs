use std::path::Path;
use std::sync::Once;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;
use trellis_common::{Error, Result};

use crate::migrations::DOCUMENTS_SCHEMA_V1;

static VEC_EXTENSION: Once = Once::new();

fn register_vec_extension() {
    VEC_EXTENSION.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute::<
            *const (),
            unsafe extern "C" fn(
                *mut rusqlite::ffi::sqlite3,
                *mut *mut std::os::raw::c_char,
                *const rusqlite::ffi::sqlite3_api_routines,
            ) -> std::os::raw::c_int,
        >(sqlite_vec::sqlite3_vec_init as *const ())));
    });
}

/// A document to index: a stable key, the text that was embedded, and
/// arbitrary metadata carried back with search hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_key: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_key: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Cosine distance; lower is closer.
    pub distance: f64,
}

/// KNN search over embedded documents, delegated to the sqlite-vec virtual
/// table. Dimensions are fixed at open time by the embedding model in use.
pub struct VectorIndex {
    conn: Connection,
    dimensions: usize,
}

impl VectorIndex {
    pub fn open(db_path: &Path, dimensions: usize) -> Result<Self> {
        register_vec_extension();
        info!(
            "opening vector index at {} ({dimensions} dims)",
            db_path.display()
        );
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open vector index: {e}")))?;
        Self::init(conn, dimensions)
    }

    pub fn in_memory(dimensions: usize) -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory index: {e}")))?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        conn.execute_batch(DOCUMENTS_SCHEMA_V1.sql)
            .map_err(|e| Error::Database(format!("documents migration failed: {e}")))?;

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_documents USING vec0(embedding float[{dimensions}]);"
        ))
        .map_err(|e| Error::Database(format!("vector table creation failed: {e}")))?;

        Ok(Self { conn, dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("count failed: {e}")))?;
        Ok(count as usize)
    }

    /// Insert or replace a document and its embedding.
    pub fn upsert(&mut self, doc: &Document, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::Database(format!(
                "embedding has {} dims, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::Database(format!("transaction failed: {e}")))?;

        // Replace any previous version of this document.
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM documents WHERE doc_key = ?1",
                [&doc.doc_key],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .map_err(|e| Error::Database(format!("lookup failed: {e}")))?;
        if let Some(id) = existing {
            tx.execute("DELETE FROM documents WHERE id = ?1", [id])
                .map_err(|e| Error::Database(format!("delete failed: {e}")))?;
            tx.execute("DELETE FROM vec_documents WHERE rowid = ?1", [id])
                .map_err(|e| Error::Database(format!("vector delete failed: {e}")))?;
        }

        tx.execute(
            "INSERT INTO documents (doc_key, content, metadata) VALUES (?1, ?2, ?3)",
            rusqlite::params![doc.doc_key, doc.content, doc.metadata.to_string()],
        )
        .map_err(|e| Error::Database(format!("insert failed: {e}")))?;
        let rowid = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO vec_documents (rowid, embedding) VALUES (?1, ?2)",
            rusqlite::params![rowid, embedding_json(embedding)],
        )
        .map_err(|e| Error::Database(format!("vector insert failed: {e}")))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("commit failed: {e}")))
    }

    /// Nearest-neighbor search; returns up to `k` documents ordered by
    /// ascending distance.
    pub fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        if embedding.len() != self.dimensions {
            return Err(Error::Database(format!(
                "query embedding has {} dims, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT d.doc_key, d.content, d.metadata, v.distance
                 FROM vec_documents v
                 JOIN documents d ON d.id = v.rowid
                 WHERE v.embedding MATCH ?1 AND v.k = ?2
                 ORDER BY v.distance",
            )
            .map_err(|e| Error::Database(format!("search prepare failed: {e}")))?;

        let rows = stmt
            .query_map(
                rusqlite::params![embedding_json(embedding), k as i64],
                |row| {
                    let metadata: String = row.get(2)?;
                    Ok(ScoredDocument {
                        doc_key: row.get(0)?,
                        content: row.get(1)?,
                        metadata: serde_json::from_str(&metadata)
                            .unwrap_or(serde_json::Value::Null),
                        distance: row.get(3)?,
                    })
                },
            )
            .map_err(|e| Error::Database(format!("search failed: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("search row failed: {e}")))
    }

    pub fn get(&self, doc_key: &str) -> Result<Option<Document>> {
        self.conn
            .query_row(
                "SELECT doc_key, content, metadata FROM documents WHERE doc_key = ?1",
                [doc_key],
                |row| {
                    let metadata: String = row.get(2)?;
                    Ok(Document {
                        doc_key: row.get(0)?,
                        content: row.get(1)?,
                        metadata: serde_json::from_str(&metadata)
                            .unwrap_or(serde_json::Value::Null),
                    })
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Database(format!("get failed: {other}"))),
            })
    }
}

/// sqlite-vec accepts a JSON array as the vector literal.
fn embedding_json(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 8 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(key: &str, content: &str) -> Document {
        Document {
            doc_key: key.to_string(),
            content: content.to_string(),
            metadata: json!({"issue_id": key}),
        }
    }

    #[test]
    fn upsert_and_count() {
        let mut index = VectorIndex::in_memory(4).expect("open");
        index.upsert(&doc("1", "login fails"), &[1.0, 0.0, 0.0, 0.0]).expect("upsert");
        index.upsert(&doc("2", "payment times out"), &[0.0, 1.0, 0.0, 0.0]).expect("upsert");
        assert_eq!(index.count().expect("count"), 2);

        // Re-upserting the same key replaces, not duplicates.
        index.upsert(&doc("1", "login broken"), &[1.0, 0.1, 0.0, 0.0]).expect("upsert");
        assert_eq!(index.count().expect("count"), 2);
        let stored = index.get("1").expect("get").expect("present");
        assert_eq!(stored.content, "login broken");
    }

    #[test]
    fn search_orders_by_distance() {
        let mut index = VectorIndex::in_memory(4).expect("open");
        index.upsert(&doc("a", "auth"), &[1.0, 0.0, 0.0, 0.0]).expect("upsert");
        index.upsert(&doc("b", "billing"), &[0.0, 1.0, 0.0, 0.0]).expect("upsert");
        index.upsert(&doc("c", "almost auth"), &[0.9, 0.1, 0.0, 0.0]).expect("upsert");

        let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).expect("search");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_key, "a");
        assert_eq!(hits[1].doc_key, "c");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::in_memory(4).expect("open");
        let err = index.upsert(&doc("x", "text"), &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, trellis_common::Error::Database(_)));
        let err = index.search(&[1.0], 3).unwrap_err();
        assert!(matches!(err, trellis_common::Error::Database(_)));
    }
}
