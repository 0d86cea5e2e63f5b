/*
 * Responsibility
 * - DB アクセス (sqlx / Postgres)
 * - tenant で絞る読み取りは TenantId を必須引数に取る
 */
pub mod error;
pub mod health_repo;
pub mod production_repo;
pub mod user_repo;
