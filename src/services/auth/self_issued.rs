use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use tracing::error;

use crate::config::ClaimConfig;
use crate::error::AppError;
use crate::services::auth::claims::VerifiedClaims;
use crate::services::auth::tenant::TenantId;
use crate::services::auth::verifier::{VerifyError, classify};

/// HS256 tokens signed and verified with one shared secret.
///
/// Claim keys come from `ClaimConfig`, so whatever the login exchange writes
/// is exactly what the tenant scoper reads back.
#[derive(Clone)]
pub struct SelfIssuedTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
    claims: ClaimConfig,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

impl SelfIssuedTokens {
    pub fn new(secret: &str, ttl_seconds: u64, leeway_seconds: u64, claims: ClaimConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = leeway_seconds;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
            claims,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Sign a credential for a user that just passed the password check.
    pub fn issue(
        &self,
        user_id: i64,
        tenant: &TenantId,
        email: Option<&str>,
        now: i64,
    ) -> Result<IssuedToken, AppError> {
        let mut claims = Map::new();
        claims.insert(self.claims.subject.clone(), Value::from(user_id));
        claims.insert(self.claims.tenant.clone(), Value::from(tenant.as_str()));
        if let Some(email) = email {
            claims.insert(self.claims.email.clone(), Value::from(email));
        }
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + self.ttl_seconds as i64));

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            AppError::Internal
        })?;

        Ok(IssuedToken {
            token,
            expires_in: self.ttl_seconds,
        })
    }

    // Local check only; no I/O.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(classify)?;

        Ok(VerifiedClaims::new(data.claims))
    }
}
