/*
 * Responsibility
 * - productions の読み取り (tenant = company_id で必ず絞る)
 * - PgPool 実装と、handler から見える ProductionStore trait
 */
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::repos::error::{RepoError, RepoResult};
use crate::services::BoxFuture;
use crate::services::auth::TenantId;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProductionRow {
    pub id: i64,
    pub company_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Tenant-scoped read access to productions.
///
/// Every method takes the `TenantId` to filter on.
pub trait ProductionStore: Send + Sync {
    fn list_for_tenant<'a>(
        &'a self,
        tenant: &'a TenantId,
    ) -> BoxFuture<'a, RepoResult<Vec<ProductionRow>>>;

    fn find_for_tenant<'a>(
        &'a self,
        tenant: &'a TenantId,
        production_id: i64,
    ) -> BoxFuture<'a, RepoResult<Option<ProductionRow>>>;
}

#[derive(Clone, Debug)]
pub struct ProductionRepo {
    pool: PgPool,
}

impl ProductionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ProductionStore for ProductionRepo {
    fn list_for_tenant<'a>(
        &'a self,
        tenant: &'a TenantId,
    ) -> BoxFuture<'a, RepoResult<Vec<ProductionRow>>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, ProductionRow>(
                r#"
                SELECT id, company_id, name, created_at
                FROM productions
                WHERE company_id = $1
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(RepoError::Db)?;

            Ok(rows)
        })
    }

    fn find_for_tenant<'a>(
        &'a self,
        tenant: &'a TenantId,
        production_id: i64,
    ) -> BoxFuture<'a, RepoResult<Option<ProductionRow>>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, ProductionRow>(
                r#"
                SELECT id, company_id, name, created_at
                FROM productions
                WHERE id = $1 AND company_id = $2
                "#,
            )
            .bind(production_id)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::Db)?;

            Ok(row)
        })
    }
}
