//! `SqliteGraphDatabase` — reference `GraphDatabase` backed by a single
//! SQLite file via `rusqlite`, one connection guarded by a mutex, WAL mode.
//!
//! Properties, schema attributes and schema relationships are JSON-encoded
//! TEXT columns. Relation labels are always bound as query parameters,
//! never interpolated into SQL text.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::graph::{DirectedEdge, EdgeDirection, GraphSchema, Node, Relationship};

use super::traits::{GraphDatabase, StorageError, StorageResult};

pub struct SqliteGraphDatabase {
    conn: Mutex<Connection>,
}

impl SqliteGraphDatabase {
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS nodes (
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                node_type TEXT NOT NULL DEFAULT '',
                properties TEXT NOT NULL DEFAULT '{}',
                perspective TEXT,
                PRIMARY KEY (user_id, name)
            );
            CREATE TABLE IF NOT EXISTS edges (
                user_id TEXT NOT NULL,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                relation TEXT NOT NULL,
                PRIMARY KEY (user_id, source, target, relation)
            );
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(user_id, source);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(user_id, target);
            CREATE TABLE IF NOT EXISTS schemas (
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                attributes TEXT NOT NULL DEFAULT '[]',
                relationships TEXT NOT NULL DEFAULT '[]',
                is_seed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, name)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn node_to_row(node: &Node) -> StorageResult<String> {
        Ok(serde_json::to_string(&node.properties)?)
    }

    fn row_to_node(
        name: String,
        node_type: String,
        properties_json: String,
        perspective: Option<String>,
    ) -> StorageResult<Node> {
        let properties: BTreeMap<String, String> = serde_json::from_str(&properties_json)?;
        Ok(Node {
            name,
            node_type,
            properties,
            perspective,
        })
    }
}

#[async_trait]
impl GraphDatabase for SqliteGraphDatabase {
    async fn initialize(&self) -> StorageResult<()> {
        let mut delay = Duration::from_millis(50);
        let deadline = Duration::from_secs(30);
        let mut elapsed = Duration::ZERO;
        loop {
            let ping = {
                let conn = self.conn.lock().unwrap();
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            };
            match ping {
                Ok(_) => return Ok(()),
                Err(err) if elapsed + delay < deadline => {
                    warn!(error = %err, "graph backend not ready, retrying");
                    tokio::time::sleep(delay).await;
                    elapsed += delay;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(5));
                }
                Err(_) => return Err(StorageError::ConnectFailed),
            }
        }
    }

    async fn create_user(&self, user_id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                params![user_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        conn.execute(
            "INSERT INTO users (user_id, created_at) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(!existed)
    }

    async fn user_exists(&self, user_id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    async fn delete_user(&self, user_id: &str) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        if !conn
            .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                params![user_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false)
        {
            return Err(StorageError::UserAbsent);
        }
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM edges WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM nodes WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM schemas WHERE user_id = ?1", params![user_id])?;
        tx.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
        tx.commit()?;
        Ok(())
    }

    async fn create_nodes(&self, nodes: &[Node], user_id: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        if !conn
            .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                params![user_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false)
        {
            return Err(StorageError::UserAbsent);
        }
        for node in nodes {
            let properties_json = Self::node_to_row(node)?;
            conn.execute(
                "INSERT INTO nodes (user_id, name, node_type, properties, perspective)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, name) DO UPDATE SET
                    node_type = excluded.node_type,
                    properties = excluded.properties,
                    perspective = excluded.perspective",
                params![
                    user_id,
                    node.name,
                    node.node_type,
                    properties_json,
                    node.perspective
                ],
            )?;
        }
        Ok(())
    }

    async fn get_node(&self, name: &str, user_id: &str) -> StorageResult<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT name, node_type, properties, perspective FROM nodes
                 WHERE user_id = ?1 AND name = ?2",
                params![user_id, name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(name, node_type, properties, perspective)| {
            Self::row_to_node(name, node_type, properties, perspective)
        })
        .transpose()
    }

    async fn get_all_nodes(&self, user_id: &str) -> StorageResult<Vec<Node>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, node_type, properties, perspective FROM nodes
             WHERE user_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(name, node_type, properties, perspective)| {
                Self::row_to_node(name, node_type, properties, perspective)
            })
            .collect()
    }

    async fn check_node_exists(
        &self,
        name: &str,
        node_type: &str,
        user_id: &str,
    ) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM nodes WHERE user_id = ?1 AND name = ?2 AND node_type = ?3",
                params![user_id, name, node_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    async fn create_relationships(
        &self,
        rels: &[Relationship],
        user_id: &str,
    ) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        for rel in rels {
            let source_ok: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM nodes WHERE user_id = ?1 AND name = ?2",
                    params![user_id, rel.source],
                    |row| row.get(0),
                )
                .optional()?;
            let target_ok: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM nodes WHERE user_id = ?1 AND name = ?2",
                    params![user_id, rel.target],
                    |row| row.get(0),
                )
                .optional()?;
            if source_ok.is_none() || target_ok.is_none() {
                continue;
            }
            conn.execute(
                "INSERT INTO edges (user_id, source, target, relation)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, source, target, relation) DO NOTHING",
                params![user_id, rel.source, rel.target, rel.relation],
            )?;
        }
        Ok(())
    }

    async fn get_node_relationships(
        &self,
        name: &str,
        user_id: &str,
    ) -> StorageResult<Vec<DirectedEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut out = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT source, target, relation FROM edges WHERE user_id = ?1 AND source = ?2",
        )?;
        let outgoing = stmt.query_map(params![user_id, name], |row| {
            Ok(Relationship::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for rel in outgoing {
            out.push(DirectedEdge {
                relationship: rel?,
                direction: EdgeDirection::Outgoing,
            });
        }
        let mut stmt = conn.prepare(
            "SELECT source, target, relation FROM edges WHERE user_id = ?1 AND target = ?2",
        )?;
        let incoming = stmt.query_map(params![user_id, name], |row| {
            Ok(Relationship::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for rel in incoming {
            out.push(DirectedEdge {
                relationship: rel?,
                direction: EdgeDirection::Incoming,
            });
        }
        Ok(out)
    }

    async fn get_all_relationships(&self, user_id: &str) -> StorageResult<Vec<Relationship>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source, target, relation FROM edges WHERE user_id = ?1
             ORDER BY source, target, relation",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(Relationship::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn clean_graph(&self) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM edges; DELETE FROM nodes; DELETE FROM schemas; DELETE FROM users;",
        )?;
        Ok(())
    }

    async fn get_all_schemas(&self, user_id: &str) -> StorageResult<Vec<GraphSchema>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, description, attributes, relationships, is_seed, created_at
             FROM schemas WHERE user_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (name, description, attributes_json, relationships_json, is_seed, created_at) =
                row?;
            let attributes: Vec<String> = serde_json::from_str(&attributes_json)?;
            let relationships: Vec<String> = serde_json::from_str(&relationships_json)?;
            let created_at: DateTime<Utc> = created_at
                .parse()
                .map_err(|_| StorageError::Database(rusqlite::Error::InvalidQuery))?;
            out.push(GraphSchema {
                name,
                description,
                attributes,
                relationships,
                is_seed,
                created_at,
            });
        }
        Ok(out)
    }

    async fn store_schema(&self, schema: &GraphSchema, user_id: &str) -> StorageResult<String> {
        let conn = self.conn.lock().unwrap();
        let attributes_json = serde_json::to_string(&schema.attributes)?;
        let relationships_json = serde_json::to_string(&schema.relationships)?;
        conn.execute(
            "INSERT INTO schemas (user_id, name, description, attributes, relationships, is_seed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, name) DO UPDATE SET
                description = excluded.description,
                attributes = excluded.attributes,
                relationships = excluded.relationships,
                is_seed = excluded.is_seed",
            params![
                user_id,
                schema.name,
                schema.description,
                attributes_json,
                relationships_json,
                schema.is_seed,
                schema.created_at.to_rfc3339(),
            ],
        )?;
        Ok(format!("{user_id}:{}", schema.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> SqliteGraphDatabase {
        SqliteGraphDatabase::open_in_memory().expect("open in-memory db")
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let db = open();
        assert!(db.create_user("alice").await.unwrap());
        assert!(!db.create_user("alice").await.unwrap());
        assert!(db.user_exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn create_nodes_rejects_absent_user() {
        let db = open();
        let err = db
            .create_nodes(&[Node::new("X")], "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UserAbsent));
    }

    #[tokio::test]
    async fn create_nodes_merges_on_name() {
        let db = open();
        db.create_user("alice").await.unwrap();
        db.create_nodes(&[Node::new("Quantum Computing").with_type("STABLE_INTEREST")], "alice")
            .await
            .unwrap();
        db.create_nodes(
            &[Node::new("Quantum Computing").with_type("ACTIVE_INTEREST")],
            "alice",
        )
        .await
        .unwrap();

        let nodes = db.get_all_nodes("alice").await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, "ACTIVE_INTEREST");
    }

    #[tokio::test]
    async fn relationships_to_missing_endpoints_are_dropped_not_fatal() {
        let db = open();
        db.create_user("alice").await.unwrap();
        db.create_nodes(&[Node::new("A")], "alice").await.unwrap();
        db.create_relationships(&[Relationship::new("A", "B", "RELATES_TO")], "alice")
            .await
            .unwrap();
        assert!(db.get_all_relationships("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn relationships_merge_on_four_tuple() {
        let db = open();
        db.create_user("alice").await.unwrap();
        db.create_nodes(&[Node::new("A"), Node::new("B")], "alice")
            .await
            .unwrap();
        db.create_relationships(&[Relationship::new("A", "B", "RELATES_TO")], "alice")
            .await
            .unwrap();
        db.create_relationships(&[Relationship::new("A", "B", "RELATES_TO")], "alice")
            .await
            .unwrap();
        assert_eq!(db.get_all_relationships("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_node_relationships_tags_direction() {
        let db = open();
        db.create_user("alice").await.unwrap();
        db.create_nodes(&[Node::new("A"), Node::new("B"), Node::new("C")], "alice")
            .await
            .unwrap();
        db.create_relationships(
            &[
                Relationship::new("A", "B", "RELATES_TO"),
                Relationship::new("C", "A", "PART_OF"),
            ],
            "alice",
        )
        .await
        .unwrap();

        let edges = db.get_node_relationships("A", "alice").await.unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges
            .iter()
            .any(|e| matches!(e.direction, EdgeDirection::Outgoing)));
        assert!(edges
            .iter()
            .any(|e| matches!(e.direction, EdgeDirection::Incoming)));
    }

    #[tokio::test]
    async fn delete_user_cascades_and_second_delete_fails() {
        let db = open();
        db.create_user("carol").await.unwrap();
        db.create_nodes(&[Node::new("A")], "carol").await.unwrap();
        db.create_relationships(&[], "carol").await.unwrap();
        db.delete_user("carol").await.unwrap();

        assert!(!db.user_exists("carol").await.unwrap());
        assert!(db.get_all_nodes("carol").await.unwrap().is_empty());
        assert!(matches!(
            db.delete_user("carol").await.unwrap_err(),
            StorageError::UserAbsent
        ));
    }

    #[tokio::test]
    async fn schemas_merge_on_name() {
        let db = open();
        db.create_user("dave").await.unwrap();
        let schema = GraphSchema::new("Core Psychology", "desc")
            .with_attributes(["PERSON"])
            .with_relationships(["WORKS_ON"]);
        db.store_schema(&schema, "dave").await.unwrap();
        let updated = GraphSchema::new("Core Psychology", "new desc")
            .with_attributes(["PERSON", "PROJECT"])
            .with_relationships(["WORKS_ON"]);
        db.store_schema(&updated, "dave").await.unwrap();

        let schemas = db.get_all_schemas("dave").await.unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].attributes.len(), 2);
    }
}
