/*
 * Responsibility
 * - POST /login の request/response DTO
 * - 形式チェック (識別子はどちらか一方だけ) はここで行う
 */
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::auth::TenantId;
use crate::services::auth::login::LoginIdentity;
use crate::services::auth::self_issued::IssuedToken;

/// `companyId` as clients send it: a string, or a bare integer id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TenantField {
    Text(String),
    Number(i64),
}

impl From<TenantField> for String {
    fn from(field: TenantField) -> Self {
        match field {
            TenantField::Text(s) => s,
            TenantField::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "tenant")]
    pub company_id: Option<TenantField>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the password
        f.debug_struct("LoginRequest")
            .field("company_id", &self.company_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LoginRequest {
    /// Split into the lookup identity and the password.
    ///
    /// Exactly one of `companyId + username` or `email` must be given.
    pub fn into_parts(self) -> Result<(LoginIdentity, String), AppError> {
        if self.password.is_empty() {
            return Err(AppError::InvalidRequest("password is required".into()));
        }

        let company_id = non_blank(self.company_id.map(String::from));
        let username = non_blank(self.username);
        let email = non_blank(self.email);

        let identity = match (company_id, username, email) {
            (Some(company_id), Some(username), None) => {
                let tenant = TenantId::parse(company_id.trim())
                    .map_err(|_| AppError::InvalidRequest("companyId is not valid".into()))?;
                LoginIdentity::TenantUser {
                    tenant,
                    username: username.trim().to_string(),
                }
            }
            (None, None, Some(email)) => LoginIdentity::Email(email.trim().to_string()),
            (None, None, None) => {
                return Err(AppError::InvalidRequest(
                    "companyId and username, or email, is required".into(),
                ));
            }
            (Some(_), None, None) | (None, Some(_), None) => {
                return Err(AppError::InvalidRequest(
                    "companyId and username must be given together".into(),
                ));
            }
            _ => {
                return Err(AppError::InvalidRequest(
                    "give either companyId and username, or email, not both".into(),
                ));
            }
        };

        Ok((identity, self.password))
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

impl LoginResponse {
    pub fn bearer(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            token_type: "Bearer",
            expires_in: issued.expires_in,
        }
    }
}
