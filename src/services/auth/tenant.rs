/*
 * Responsibility
 * - 検証済み claim から Principal (id / email / tenant) を組み立てる
 * - tenant claim のキーは設定値 (名前空間付き URL になる IdP がある)
 * - tenant が取れない場合は「未スコープで続行」ではなく明示的に失敗させる
 */
use std::fmt;

use thiserror::Error;

use crate::config::ClaimConfig;
use crate::services::auth::claims::VerifiedClaims;

const MAX_TENANT_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("tenant claim {0:?} missing or not a string")]
    MissingClaim(String),

    #[error("tenant identifier is not usable: {0}")]
    Invalid(&'static str),

    #[error("subject claim {0:?} missing")]
    MissingSubject(String),
}

/// Tenant identifier taken from a verified credential.
///
/// Validated so it can be bound into queries and used verbatim as one storage
/// path segment. The value is never rewritten: `" acme"` is rejected rather
/// than read as `acme`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(value: &str) -> Result<Self, TenantError> {
        if value.is_empty() {
            return Err(TenantError::Invalid("empty"));
        }
        if value.trim() != value {
            return Err(TenantError::Invalid("surrounding whitespace"));
        }
        if value.len() > MAX_TENANT_LEN {
            return Err(TenantError::Invalid("too long"));
        }
        if value == "." || value == ".." {
            return Err(TenantError::Invalid("relative path segment"));
        }
        if value
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(TenantError::Invalid("path separator or control character"));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated actor of one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
    pub tenant: TenantId,
}

#[derive(Debug, Clone)]
pub struct TenantScoper {
    claims: ClaimConfig,
}

impl TenantScoper {
    pub fn new(claims: ClaimConfig) -> Self {
        Self { claims }
    }

    pub fn tenant_claim(&self) -> &str {
        &self.claims.tenant
    }

    pub fn tenant(&self, claims: &VerifiedClaims) -> Result<TenantId, TenantError> {
        let raw = claims
            .string_claim(&self.claims.tenant)
            .ok_or_else(|| TenantError::MissingClaim(self.claims.tenant.clone()))?;
        TenantId::parse(&raw)
    }

    pub fn principal(&self, claims: &VerifiedClaims) -> Result<Principal, TenantError> {
        let id = claims
            .string_claim(&self.claims.subject)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TenantError::MissingSubject(self.claims.subject.clone()))?;

        let tenant = self.tenant(claims)?;

        let email = claims
            .get(&self.claims.email)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Principal { id, email, tenant })
    }
}
