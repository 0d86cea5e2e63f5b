use sqlx::PgPool;

use crate::repos::error::{RepoError, RepoResult};
use crate::services::BoxFuture;

/// Per-request database reachability check for `/health`.
pub trait HealthProbe: Send + Sync {
    fn ping(&self) -> BoxFuture<'_, RepoResult<()>>;
}

#[derive(Clone, Debug)]
pub struct PgHealthProbe {
    pool: PgPool,
}

impl PgHealthProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl HealthProbe for PgHealthProbe {
    fn ping(&self) -> BoxFuture<'_, RepoResult<()>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(RepoError::Db)?;
            Ok(())
        })
    }
}
