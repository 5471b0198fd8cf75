//! `SqliteVecStore` — persistent vector storage via `sqlite-vec`.
//!
//! Implements `VectorStore` using a `vec0` virtual table for KNN search.
//! Each user gets its own partition via a `user_id TEXT PARTITION KEY`
//! column, giving user isolation at the query level.
//!
//! Vectors are L2-normalized on insert so the L2 distance `vec0` returns can
//! be converted to cosine similarity: `sim = 1 - dist² / 2`.
//!
//! Uses its own connection (WAL mode) to avoid contention with the graph
//! database's connection.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;

use super::traits::{clamp_k, SimilarityHit, VectorError, VectorResult, VectorStore};

pub struct SqliteVecStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

fn register_vec_extension() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, slice.len() * 4) }
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

impl SqliteVecStore {
    pub fn open(path: &Path, dimension: usize) -> VectorResult<Self> {
        register_vec_extension();
        let conn =
            Connection::open(path).map_err(|e| VectorError::Backend(e.to_string()))?;
        Self::init_connection(conn, dimension)
    }

    pub fn open_in_memory(dimension: usize) -> VectorResult<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory().map_err(|e| VectorError::Backend(e.to_string()))?;
        Self::init_connection(conn, dimension)
    }

    fn init_connection(conn: Connection, dimension: usize) -> VectorResult<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        let create_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_embeddings USING vec0(\
                 user_id TEXT PARTITION KEY,\
                 node_name TEXT,\
                 embedding float[{dimension}]\
             )"
        );
        conn.execute_batch(&create_sql)
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVecStore {
    async fn initialize(&self) -> VectorResult<()> {
        Ok(())
    }

    async fn add_embedding(
        &self,
        node_name: &str,
        vector: Vec<f32>,
        user_id: &str,
    ) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let mut normalized = vector;
        l2_normalize(&mut normalized);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized);
        conn.execute(
            "INSERT OR REPLACE INTO vec_embeddings(user_id, node_name, embedding) \
             VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, node_name, bytes],
        )
        .map_err(|e| VectorError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn has(&self, node_name: &str, user_id: &str) -> VectorResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vec_embeddings WHERE user_id = ?1 AND node_name = ?2",
                rusqlite::params![user_id, node_name],
                |row| row.get(0),
            )
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        Ok(count > 0)
    }

    async fn search_similar(
        &self,
        vector: &[f32],
        user_id: &str,
        k: usize,
    ) -> VectorResult<Vec<SimilarityHit>> {
        let k = clamp_k(k);
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut normalized_query = vector.to_vec();
        l2_normalize(&mut normalized_query);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized_query);

        let mut stmt = conn
            .prepare(
                "SELECT node_name, distance FROM vec_embeddings \
                 WHERE embedding MATCH ?1 AND user_id = ?2 AND k = ?3",
            )
            .map_err(|e| VectorError::Backend(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params![bytes, user_id, k as i64], |row| {
                let name: String = row.get(0)?;
                let distance: f32 = row.get(1)?;
                Ok((name, distance))
            })
            .map_err(|e| VectorError::Backend(e.to_string()))?;

        let mut hits = Vec::new();
        for row in rows {
            let (node_name, distance) =
                row.map_err(|e| VectorError::Backend(e.to_string()))?;
            let score = 1.0 - (distance * distance) / 2.0;
            hits.push(SimilarityHit { node_name, score });
        }
        Ok(hits)
    }

    async fn delete_user(&self, user_id: &str) -> VectorResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM vec_embeddings WHERE user_id = ?1",
            rusqlite::params![user_id],
        )
        .map_err(|e| VectorError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn drop_index(&self) -> VectorResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DELETE FROM vec_embeddings;")
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_has_round_trip() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        assert!(!store.has("travel", "u1").await.unwrap());
        store
            .add_embedding("travel", vec![0.9, 0.3, 0.1], "u1")
            .await
            .unwrap();
        assert!(store.has("travel", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn user_isolation_in_search_and_has() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        store
            .add_embedding("travel", vec![0.9, 0.3, 0.1], "u1")
            .await
            .unwrap();
        let hits = store
            .search_similar(&[0.9, 0.3, 0.1], "u2", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert!(!store.has("travel", "u2").await.unwrap());
    }
}
