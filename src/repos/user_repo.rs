/*
 * Responsibility
 * - users テーブル向け SQLx 操作 (login 用の lookup のみ)
 * - password は bcrypt hash のまま返す (比較は service 側)
 */
use sqlx::{FromRow, PgPool};

use crate::repos::error::{RepoError, RepoResult};
use crate::services::BoxFuture;
use crate::services::auth::TenantId;

#[derive(Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub company_id: String,
    pub username: String,
    pub email: Option<String>,
    #[sqlx(rename = "password")]
    pub password_hash: String,
}

impl std::fmt::Debug for UserRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the password hash
        f.debug_struct("UserRow")
            .field("id", &self.id)
            .field("company_id", &self.company_id)
            .field("username", &self.username)
            .finish()
    }
}

pub trait UserStore: Send + Sync {
    fn find_by_tenant_and_username<'a>(
        &'a self,
        tenant: &'a TenantId,
        username: &'a str,
    ) -> BoxFuture<'a, RepoResult<Option<UserRow>>>;

    /// All users with this email, across tenants (the caller rejects ambiguity).
    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, RepoResult<Vec<UserRow>>>;
}

#[derive(Clone, Debug)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserStore for UserRepo {
    fn find_by_tenant_and_username<'a>(
        &'a self,
        tenant: &'a TenantId,
        username: &'a str,
    ) -> BoxFuture<'a, RepoResult<Option<UserRow>>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, company_id, username, email, password
                FROM users
                WHERE company_id = $1 AND username = $2
                "#,
            )
            .bind(tenant.as_str())
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::Db)?;

            Ok(row)
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, RepoResult<Vec<UserRow>>> {
        Box::pin(async move {
            // two rows are enough to detect ambiguity
            let rows = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, company_id, username, email, password
                FROM users
                WHERE lower(email) = lower($1)
                ORDER BY id
                LIMIT 2
                "#,
            )
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(RepoError::Db)?;

            Ok(rows)
        })
    }
}
