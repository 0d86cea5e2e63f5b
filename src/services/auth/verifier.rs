//! Credential verification strategy.
//!
//! `CredentialVerifier` is chosen once at startup (`AUTH_MODE`) and shared by
//! every request. Handlers only ever see the resulting `VerifiedClaims`.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use thiserror::Error;

use crate::services::auth::claims::VerifiedClaims;
use crate::services::auth::delegated::DelegatedVerifier;
use crate::services::auth::self_issued::SelfIssuedTokens;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("missing bearer credential")]
    Missing,

    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("invalid signature or algorithm")]
    SignatureInvalid,

    #[error("credential expired")]
    Expired,

    #[error("signing key lookup failed: {0}")]
    KeyLookupFailed(#[from] KeyLookupError),

    #[error("audience or issuer mismatch")]
    AudienceOrIssuerMismatch,
}

#[derive(Debug, Error)]
pub enum KeyLookupError {
    #[error("key set unavailable: {0}")]
    Unavailable(String),

    #[error("credential header has no kid")]
    MissingKid,

    #[error("no key for kid {0:?}")]
    UnknownKid(String),

    #[error("unusable key: {0}")]
    UnusableKey(String),
}

/// Caller-visible reason of a 403. Carries no upstream detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Malformed,
    SignatureInvalid,
    Expired,
    KeyLookupFailed,
    AudienceOrIssuerMismatch,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Malformed => "MALFORMED_CREDENTIAL",
            Rejection::SignatureInvalid => "SIGNATURE_INVALID",
            Rejection::Expired => "CREDENTIAL_EXPIRED",
            Rejection::KeyLookupFailed => "KEY_LOOKUP_FAILED",
            Rejection::AudienceOrIssuerMismatch => "AUDIENCE_OR_ISSUER_MISMATCH",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed credential",
            Rejection::SignatureInvalid => "invalid credential signature",
            Rejection::Expired => "credential expired",
            Rejection::KeyLookupFailed => "signing key not found",
            Rejection::AudienceOrIssuerMismatch => "credential not issued for this service",
        }
    }
}

impl VerifyError {
    /// Rejection reported for a present-but-invalid credential.
    ///
    /// `Missing` never reaches the caller as a 403; it is mapped to 401 first.
    pub fn rejection(&self) -> Rejection {
        match self {
            VerifyError::Missing | VerifyError::Malformed(_) => Rejection::Malformed,
            VerifyError::SignatureInvalid => Rejection::SignatureInvalid,
            VerifyError::Expired => Rejection::Expired,
            VerifyError::KeyLookupFailed(_) => Rejection::KeyLookupFailed,
            VerifyError::AudienceOrIssuerMismatch => Rejection::AudienceOrIssuerMismatch,
        }
    }
}

/// Map a `jsonwebtoken` decode failure onto the rejection taxonomy.
pub(crate) fn classify(e: JwtError) -> VerifyError {
    match e.kind() {
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => VerifyError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => VerifyError::SignatureInvalid,
        ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => {
            VerifyError::AudienceOrIssuerMismatch
        }
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" || claim == "iss" => {
            VerifyError::AudienceOrIssuerMismatch
        }
        _ => VerifyError::Malformed(e.to_string()),
    }
}

pub enum CredentialVerifier {
    SelfIssued(SelfIssuedTokens),
    Delegated(DelegatedVerifier),
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        match self {
            CredentialVerifier::SelfIssued(_) => f.write_str("CredentialVerifier::SelfIssued"),
            CredentialVerifier::Delegated(d) => f
                .debug_tuple("CredentialVerifier::Delegated")
                .field(d)
                .finish(),
        }
    }
}

impl CredentialVerifier {
    /// Verify the bearer credential of one request.
    ///
    /// `None` means the request carried no credential at all.
    pub async fn verify(&self, bearer: Option<&str>) -> Result<VerifiedClaims, VerifyError> {
        let token = bearer.ok_or(VerifyError::Missing)?;

        match self {
            CredentialVerifier::SelfIssued(tokens) => tokens.verify(token),
            CredentialVerifier::Delegated(delegated) => delegated.verify(token).await,
        }
    }

    /// Signer for the login exchange. Only self-issued mode has one.
    pub fn issuer(&self) -> Option<&SelfIssuedTokens> {
        match self {
            CredentialVerifier::SelfIssued(tokens) => Some(tokens),
            CredentialVerifier::Delegated(_) => None,
        }
    }
}
