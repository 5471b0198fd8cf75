//! `UserService`: user lifecycle — format validation, creation with seed
//! schemas, and cascade deletion.

use std::sync::Arc;

use thiserror::Error;

use crate::graph::validate_user_id;
use crate::schema_registry::{SchemaRegistry, SchemaRegistryError};
use crate::storage::{GraphDatabase, StorageError};
use crate::vector::{VectorError, VectorStore};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user id does not match the required format")]
    InvalidUserId,
    #[error("user does not exist")]
    UserAbsent,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("vector error: {0}")]
    Vector(#[from] VectorError),
    #[error("schema registry error: {0}")]
    Schema(#[from] SchemaRegistryError),
}

pub type UserResult<T> = Result<T, UserError>;

impl From<SchemaRegistryError> for UserError {
    fn from(err: SchemaRegistryError) -> Self {
        match err {
            SchemaRegistryError::UserAbsent => UserError::UserAbsent,
            other => UserError::Schema(other),
        }
    }
}

/// `true` if the user was newly created, `false` if it already existed.
pub struct CreateOutcome {
    pub created: bool,
}

pub struct UserService {
    database: Arc<dyn GraphDatabase>,
    vectors: Arc<dyn VectorStore>,
    schemas: Arc<SchemaRegistry>,
}

impl UserService {
    pub fn new(
        database: Arc<dyn GraphDatabase>,
        vectors: Arc<dyn VectorStore>,
        schemas: Arc<SchemaRegistry>,
    ) -> Self {
        Self {
            database,
            vectors,
            schemas,
        }
    }

    pub async fn create_user(&self, user_id: &str) -> UserResult<CreateOutcome> {
        if !validate_user_id(user_id) {
            return Err(UserError::InvalidUserId);
        }
        let created = self.database.create_user(user_id).await?;
        self.schemas.ensure_seed_schemas(user_id).await?;
        Ok(CreateOutcome { created })
    }

    /// Cascade deletion: vector entries are removed before the user root so
    /// no orphan vector can ever be observed. Errors `UserAbsent` if the
    /// user does not exist.
    pub async fn delete_user(&self, user_id: &str) -> UserResult<()> {
        if !self.database.user_exists(user_id).await? {
            return Err(UserError::UserAbsent);
        }
        self.vectors.delete_user(user_id).await?;
        self.database.delete_user(user_id).await?;
        Ok(())
    }

    pub async fn user_exists(&self, user_id: &str) -> UserResult<bool> {
        Ok(self.database.user_exists(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteGraphDatabase;
    use crate::vector::InMemoryVectorStore;

    async fn harness() -> UserService {
        let db: Arc<dyn GraphDatabase> = Arc::new(SqliteGraphDatabase::open_in_memory().unwrap());
        db.initialize().await.unwrap();
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(8));
        let schemas = Arc::new(SchemaRegistry::new(db.clone()));
        UserService::new(db, vectors, schemas)
    }

    #[tokio::test]
    async fn create_user_rejects_invalid_format() {
        let service = harness().await;
        let err = service.create_user("has spaces").await.unwrap_err();
        assert!(matches!(err, UserError::InvalidUserId));
    }

    #[tokio::test]
    async fn create_user_seeds_schemas() {
        let service = harness().await;
        let outcome = service.create_user("alice").await.unwrap();
        assert!(outcome.created);
        let schemas = service.schemas.get_all_schemas("alice").await.unwrap();
        assert_eq!(schemas.len(), 1);
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let service = harness().await;
        assert!(service.create_user("alice").await.unwrap().created);
        assert!(!service.create_user("alice").await.unwrap().created);
    }

    #[tokio::test]
    async fn delete_user_rejects_absent_user() {
        let service = harness().await;
        let err = service.delete_user("ghost").await.unwrap_err();
        assert!(matches!(err, UserError::UserAbsent));
    }

    #[tokio::test]
    async fn delete_user_round_trip() {
        let service = harness().await;
        service.create_user("alice").await.unwrap();
        service.delete_user("alice").await.unwrap();
        assert!(!service.user_exists("alice").await.unwrap());
    }
}
