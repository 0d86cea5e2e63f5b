pub mod claims;
pub mod delegated;
pub mod factory;
pub mod jwks;
pub mod login;
pub mod self_issued;
pub mod tenant;
pub mod verifier;

pub use claims::VerifiedClaims;
pub use factory::{build_login_service, build_verifier};
pub use tenant::{Principal, TenantId, TenantScoper};
pub use verifier::CredentialVerifier;
