//! `SchemaRegistry`: stores `GraphSchema` records and seeds each user with a
//! default schema on first access.

use std::sync::Arc;

use thiserror::Error;

use crate::graph::{render_schema_context, seed_schemas, GraphSchema};
use crate::storage::{GraphDatabase, StorageError};

#[derive(Debug, Error)]
pub enum SchemaRegistryError {
    #[error("user does not exist")]
    UserAbsent,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type SchemaRegistryResult<T> = Result<T, SchemaRegistryError>;

impl From<StorageError> for SchemaRegistryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserAbsent => SchemaRegistryError::UserAbsent,
            other => SchemaRegistryError::Storage(other),
        }
    }
}

pub struct SchemaRegistry {
    database: Arc<dyn GraphDatabase>,
}

impl SchemaRegistry {
    pub fn new(database: Arc<dyn GraphDatabase>) -> Self {
        Self { database }
    }

    async fn require_user(&self, user_id: &str) -> SchemaRegistryResult<()> {
        if self.database.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(SchemaRegistryError::UserAbsent)
        }
    }

    pub async fn get_all_schemas(&self, user_id: &str) -> SchemaRegistryResult<Vec<GraphSchema>> {
        self.require_user(user_id).await?;
        Ok(self.database.get_all_schemas(user_id).await?)
    }

    pub async fn store_schema(
        &self,
        schema: &GraphSchema,
        user_id: &str,
    ) -> SchemaRegistryResult<String> {
        self.require_user(user_id).await?;
        Ok(self.database.store_schema(schema, user_id).await?)
    }

    /// Idempotent: installs each declared seed schema for `user_id` if a
    /// schema of that name is not already present. Safe to call on every
    /// ingestion, not just at user creation.
    pub async fn ensure_seed_schemas(&self, user_id: &str) -> SchemaRegistryResult<()> {
        let existing = self.get_all_schemas(user_id).await?;
        for seed in seed_schemas() {
            if !existing.iter().any(|s| s.name == seed.name) {
                self.store_schema(&seed, user_id).await?;
            }
        }
        Ok(())
    }

    /// The deterministic schema-context string the `Constructor` passes to
    /// the `Extractor`.
    pub async fn build_schema_context(&self, user_id: &str) -> SchemaRegistryResult<String> {
        let schemas = self.get_all_schemas(user_id).await?;
        Ok(render_schema_context(&schemas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteGraphDatabase;

    async fn harness() -> SchemaRegistry {
        let db: Arc<dyn GraphDatabase> = Arc::new(SqliteGraphDatabase::open_in_memory().unwrap());
        db.initialize().await.unwrap();
        db.create_user("alice").await.unwrap();
        SchemaRegistry::new(db)
    }

    #[tokio::test]
    async fn ensure_seed_schemas_is_idempotent() {
        let registry = harness().await;
        registry.ensure_seed_schemas("alice").await.unwrap();
        registry.ensure_seed_schemas("alice").await.unwrap();
        let schemas = registry.get_all_schemas("alice").await.unwrap();
        assert_eq!(schemas.len(), 1);
    }

    #[tokio::test]
    async fn build_schema_context_reflects_stored_schemas() {
        let registry = harness().await;
        registry.ensure_seed_schemas("alice").await.unwrap();
        let context = registry.build_schema_context("alice").await.unwrap();
        assert!(context.contains("## Schema: Core Psychology"));
    }

    #[tokio::test]
    async fn get_all_schemas_rejects_absent_user() {
        let registry = harness().await;
        let err = registry.get_all_schemas("ghost").await.unwrap_err();
        assert!(matches!(err, SchemaRegistryError::UserAbsent));
    }
}
