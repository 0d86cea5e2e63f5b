/*
 * Responsibility
 * - object storage の prefix listing (key 一覧のみ)
 * - prefix は TenantId からしか作れない (リクエストの値を混ぜない)
 */
use std::fmt;

use thiserror::Error;

use crate::services::BoxFuture;
use crate::services::auth::TenantId;

pub mod gcs;

pub use gcs::GcsStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage returned status {0}")]
    Status(u16),

    #[error("storage credentials unusable: {0}")]
    Credentials(String),

    #[error("storage access token unavailable: {0}")]
    Token(String),
}

/// Key prefix of one production's files, always under the owning tenant.
///
/// `companies/{tenant}/productions/{production_id}/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePrefix(String);

impl StoragePrefix {
    pub fn for_production(tenant: &TenantId, production_id: i64) -> Self {
        Self(format!(
            "companies/{}/productions/{}/",
            tenant.as_str(),
            production_id
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ObjectStorage: Send + Sync {
    /// Every object key starting with `prefix`, in listing order.
    fn list_keys<'a>(
        &'a self,
        prefix: &'a StoragePrefix,
    ) -> BoxFuture<'a, Result<Vec<String>, StorageError>>;
}
