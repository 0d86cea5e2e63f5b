/*
 * Responsibility
 * - repo が上位に伝える失敗の定義 (詳細はログにのみ残す)
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
