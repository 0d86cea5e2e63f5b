use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::AppError;
use crate::repos::user_repo::{UserRow, UserStore};
use crate::services::auth::self_issued::{IssuedToken, SelfIssuedTokens};
use crate::services::auth::tenant::TenantId;

/// How the caller identifies themselves at login.
#[derive(Debug, Clone)]
pub enum LoginIdentity {
    TenantUser { tenant: TenantId, username: String },
    Email(String),
}

/// Password login for self-issued mode.
///
/// Every failure (unknown user, wrong password, ambiguous email, unreadable
/// stored hash) ends in the same `AppError::InvalidCredentials`.
#[derive(Clone)]
pub struct LoginService {
    users: Arc<dyn UserStore>,
    tokens: Arc<SelfIssuedTokens>,
    // Compared against when no user matched, so both paths cost one bcrypt verify.
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for LoginService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginService")
            .field("ttl_seconds", &self.tokens.ttl_seconds())
            .finish()
    }
}

impl LoginService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<SelfIssuedTokens>, dummy_hash: String) -> Self {
        Self {
            users,
            tokens,
            dummy_hash: dummy_hash.into(),
        }
    }

    pub async fn login(
        &self,
        identity: LoginIdentity,
        password: String,
    ) -> Result<IssuedToken, AppError> {
        let user = self.lookup(&identity).await?;

        let hash = match &user {
            Some(u) => u.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };

        let matched = password_matches(password, hash).await?;

        let user = match (user, matched) {
            (Some(user), true) => user,
            (None, _) => {
                debug!("login failed: no such user");
                return Err(AppError::InvalidCredentials);
            }
            (Some(user), false) => {
                debug!(user_id = user.id, "login failed: password mismatch");
                return Err(AppError::InvalidCredentials);
            }
        };

        // Stored company_id is trusted, but it still has to be a usable tenant.
        let tenant = TenantId::parse(&user.company_id).map_err(|e| {
            error!(user_id = user.id, error = %e, "stored company_id is not a valid tenant");
            AppError::InvalidCredentials
        })?;

        let now = chrono::Utc::now().timestamp();
        self.tokens.issue(user.id, &tenant, user.email.as_deref(), now)
    }

    async fn lookup(&self, identity: &LoginIdentity) -> Result<Option<UserRow>, AppError> {
        match identity {
            LoginIdentity::TenantUser { tenant, username } => Ok(self
                .users
                .find_by_tenant_and_username(tenant, username)
                .await?),
            LoginIdentity::Email(email) => {
                let mut rows = self.users.find_by_email(email).await?;
                if rows.len() > 1 {
                    warn!("login by email matched users in several tenants");
                    return Ok(None);
                }
                Ok(rows.pop())
            }
        }
    }
}

// bcrypt is CPU-bound; keep it off the async workers.
async fn password_matches(password: String, hash: String) -> Result<bool, AppError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| {
            error!(error = %e, "password verification task failed");
            AppError::Internal
        })?;

    match verified {
        Ok(matched) => Ok(matched),
        Err(e) => {
            error!(error = %e, "stored password hash is unreadable");
            Ok(false)
        }
    }
}
