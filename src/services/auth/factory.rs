/// Factory: build the credential verifier and login service from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::{AuthConfig, Config};
use crate::error::AppError;
use crate::repos::user_repo::UserStore;
use crate::services::auth::delegated::{DelegatedPolicy, DelegatedVerifier};
use crate::services::auth::jwks::{HttpJwksFetcher, JwksCache};
use crate::services::auth::login::LoginService;
use crate::services::auth::self_issued::SelfIssuedTokens;
use crate::services::auth::verifier::CredentialVerifier;

pub fn build_verifier(config: &Config) -> Result<CredentialVerifier, AppError> {
    match &config.auth {
        AuthConfig::SelfIssued(c) => {
            info!(tenant_claim = %config.claims.tenant, "using self-issued credentials");
            Ok(CredentialVerifier::SelfIssued(SelfIssuedTokens::new(
                &c.jwt_secret,
                c.access_token_ttl_seconds,
                config.access_token_leeway_seconds,
                config.claims.clone(),
            )))
        }
        AuthConfig::Delegated(c) => {
            info!(
                jwks_url = %c.jwks_url,
                issuer = %c.issuer,
                tenant_claim = %config.claims.tenant,
                "using delegated credentials"
            );
            let fetcher =
                HttpJwksFetcher::new(c.jwks_url.clone(), Duration::from_secs(c.jwks_timeout_seconds))
                    .map_err(|e| {
                        error!(error = %e, "failed to build JWKS http client");
                        AppError::Internal
                    })?;

            let cache = JwksCache::new(
                Arc::new(fetcher),
                Duration::from_secs(c.jwks_cache_ttl_seconds),
            );

            Ok(CredentialVerifier::Delegated(DelegatedVerifier::new(
                Arc::new(cache),
                DelegatedPolicy {
                    issuer: c.issuer.clone(),
                    audience: c.audience.clone(),
                    algorithms: c.algorithms.clone(),
                    leeway_seconds: config.access_token_leeway_seconds,
                },
            )))
        }
    }
}

/// Login is only offered when this process signs its own credentials.
pub fn build_login_service(
    config: &Config,
    verifier: &CredentialVerifier,
    users: Arc<dyn UserStore>,
) -> Result<Option<LoginService>, AppError> {
    let (AuthConfig::SelfIssued(c), Some(tokens)) = (&config.auth, verifier.issuer()) else {
        return Ok(None);
    };

    Ok(Some(LoginService::new(
        users,
        Arc::new(tokens.clone()),
        dummy_hash(c.bcrypt_cost)?,
    )))
}

// Compared when no user matched. Same cost as the stored hashes, otherwise
// the response time tells unknown users apart.
fn dummy_hash(cost: u32) -> Result<String, AppError> {
    bcrypt::hash("no-such-user", cost).map_err(|e| {
        error!(error = %e, cost, "failed to prepare dummy password hash");
        AppError::Internal
    })
}
