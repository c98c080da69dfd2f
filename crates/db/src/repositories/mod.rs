use async_trait::async_trait;
use thiserror::Error;

use sentra_core::TenantCredential;

pub mod tenant;

pub use tenant::SqlTenantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Tenant directory: lookup from tenant name to stored credential record.
///
/// Upsert is last-write-wins on the whole record; a second upsert under the
/// same name replaces every field, never merges.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn upsert(&self, record: TenantCredential) -> Result<TenantCredential, RepositoryError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<TenantCredential>, RepositoryError>;
    async fn list(&self) -> Result<Vec<TenantCredential>, RepositoryError>;
    async fn delete(&self, name: &str) -> Result<bool, RepositoryError>;
}
