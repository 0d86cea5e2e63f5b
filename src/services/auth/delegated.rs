use std::sync::Arc;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::is_asymmetric;
use crate::services::auth::claims::VerifiedClaims;
use crate::services::auth::jwks::JwksCache;
use crate::services::auth::verifier::{KeyLookupError, VerifyError, classify};

/// Expected values for credentials minted by the third-party authority.
#[derive(Debug, Clone)]
pub struct DelegatedPolicy {
    pub issuer: String,
    pub audience: String,
    pub algorithms: Vec<Algorithm>,
    pub leeway_seconds: u64,
}

/// Verifies third-party credentials against the authority's published keys.
///
/// - Only asymmetric algorithms from the allow-list are accepted.
/// - `exp`, `aud`, `iss`, `sub` are required; a future `nbf` is rejected.
#[derive(Debug)]
pub struct DelegatedVerifier {
    keys: Arc<JwksCache>,
    policy: DelegatedPolicy,
}

impl DelegatedVerifier {
    pub fn new(keys: Arc<JwksCache>, mut policy: DelegatedPolicy) -> Self {
        // Symmetric algorithms are never allowed here.
        policy.algorithms.retain(|alg| is_asymmetric(*alg));
        Self { keys, policy }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|e| VerifyError::Malformed(e.to_string()))?;

        if !self.policy.algorithms.contains(&header.alg) {
            warn!(alg = ?header.alg, "credential algorithm not allowed");
            return Err(VerifyError::SignatureInvalid);
        }

        let kid = header.kid.as_deref().ok_or(KeyLookupError::MissingKid)?;
        let jwk = self.keys.key_for(kid).await?;

        if !key_matches_algorithm(&jwk, header.alg) {
            warn!(kid, alg = ?header.alg, "published key does not match credential algorithm");
            return Err(VerifyError::SignatureInvalid);
        }

        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| KeyLookupError::UnusableKey(e.to_string()))?;

        let validation = self.validation(header.alg);
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation)
            .map_err(classify)?;

        Ok(VerifiedClaims::new(data.claims))
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.algorithms = vec![alg];
        validation.set_issuer(&[self.policy.issuer.as_str()]);
        validation.set_audience(&[self.policy.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = self.policy.leeway_seconds;
        validation
    }
}

// A symmetric (`oct`) key in the set, or a key pinned to another algorithm,
// must never verify the credential.
fn key_matches_algorithm(jwk: &Jwk, alg: Algorithm) -> bool {
    let family_ok = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(_) => {
            matches!(alg, Algorithm::ES256 | Algorithm::ES384)
        }
        AlgorithmParameters::OctetKeyPair(_) => matches!(alg, Algorithm::EdDSA),
        _ => false,
    };

    family_ok
        && jwk
            .common
            .key_algorithm
            .as_ref()
            .is_none_or(|pinned| same_algorithm(pinned, alg))
}

fn same_algorithm(pinned: &KeyAlgorithm, alg: Algorithm) -> bool {
    // Both serialize to their JOSE names ("RS256", ...).
    match (serde_json::to_value(pinned), serde_json::to_value(alg)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
