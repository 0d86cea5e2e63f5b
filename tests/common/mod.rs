//! Shared fixtures for the HTTP-level tests.
//!
//! The real router is driven with in-memory stores; a local axum server plays
//! the identity provider's JWKS endpoint.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::get,
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use documents_api::app::build_router;
use documents_api::config::{ClaimConfig, Config};
use documents_api::repos::error::RepoResult;
use documents_api::repos::health_repo::HealthProbe;
use documents_api::repos::production_repo::{ProductionRow, ProductionStore};
use documents_api::repos::user_repo::{UserRow, UserStore};
use documents_api::services::BoxFuture;
use documents_api::services::auth::delegated::{DelegatedPolicy, DelegatedVerifier};
use documents_api::services::auth::jwks::{HttpJwksFetcher, JwksCache};
use documents_api::services::auth::login::LoginService;
use documents_api::services::auth::self_issued::SelfIssuedTokens;
use documents_api::services::auth::{CredentialVerifier, TenantId, TenantScoper};
use documents_api::services::storage::{ObjectStorage, StorageError, StoragePrefix};
use documents_api::state::AppState;

pub const SECRET: &str = "integration-test-secret";
pub const KID: &str = "test-key-1";
pub const ISSUER: &str = "https://tenant.auth.example.com/";
pub const AUDIENCE: &str = "https://documents.example.com";
pub const DELEGATED_TENANT_CLAIM: &str = "https://documents.example.com/company_id";

const BCRYPT_TEST_COST: u32 = 4;

pub const PRIVATE_KEY_PEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/delegated_rsa_private.pem"
));
pub const JWKS_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/jwks.json"
));

// ---- in-memory collaborators ----

pub struct Productions(pub Vec<ProductionRow>);

impl ProductionStore for Productions {
    fn list_for_tenant<'a>(
        &'a self,
        tenant: &'a TenantId,
    ) -> BoxFuture<'a, RepoResult<Vec<ProductionRow>>> {
        Box::pin(async move {
            let mut rows: Vec<_> = self
                .0
                .iter()
                .filter(|p| p.company_id == tenant.as_str())
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(rows)
        })
    }

    fn find_for_tenant<'a>(
        &'a self,
        tenant: &'a TenantId,
        production_id: i64,
    ) -> BoxFuture<'a, RepoResult<Option<ProductionRow>>> {
        Box::pin(async move {
            Ok(self
                .0
                .iter()
                .find(|p| p.company_id == tenant.as_str() && p.id == production_id)
                .cloned())
        })
    }
}

pub struct Users(pub Vec<UserRow>);

impl UserStore for Users {
    fn find_by_tenant_and_username<'a>(
        &'a self,
        tenant: &'a TenantId,
        username: &'a str,
    ) -> BoxFuture<'a, RepoResult<Option<UserRow>>> {
        Box::pin(async move {
            Ok(self
                .0
                .iter()
                .find(|u| u.company_id == tenant.as_str() && u.username == username)
                .cloned())
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, RepoResult<Vec<UserRow>>> {
        Box::pin(async move {
            Ok(self
                .0
                .iter()
                .filter(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
                .take(2)
                .cloned()
                .collect())
        })
    }
}

/// Object listing that records every prefix it was asked for.
pub struct RecordingStorage {
    objects: Vec<String>,
    failing: bool,
    pub prefixes: Mutex<Vec<String>>,
}

impl RecordingStorage {
    pub fn new(objects: &[&str]) -> Self {
        Self {
            objects: objects.iter().map(|s| s.to_string()).collect(),
            failing: false,
            prefixes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(&[])
        }
    }

    pub fn requested_prefixes(&self) -> Vec<String> {
        self.prefixes.lock().unwrap().clone()
    }
}

impl ObjectStorage for RecordingStorage {
    fn list_keys<'a>(
        &'a self,
        prefix: &'a StoragePrefix,
    ) -> BoxFuture<'a, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            self.prefixes.lock().unwrap().push(prefix.to_string());
            if self.failing {
                return Err(StorageError::Status(500));
            }
            Ok(self
                .objects
                .iter()
                .filter(|k| k.starts_with(prefix.as_str()))
                .cloned()
                .collect())
        })
    }
}

pub struct Health {
    pub up: bool,
}

impl HealthProbe for Health {
    fn ping(&self) -> BoxFuture<'_, RepoResult<()>> {
        Box::pin(async move {
            if self.up {
                Ok(())
            } else {
                Err(sqlx::Error::PoolTimedOut.into())
            }
        })
    }
}

// ---- seed data ----

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub fn productions() -> Vec<ProductionRow> {
    vec![
        ProductionRow {
            id: 1,
            company_id: "acme".into(),
            name: "Pilot".into(),
            created_at: at(1),
        },
        ProductionRow {
            id: 2,
            company_id: "acme".into(),
            name: "Season Two".into(),
            created_at: at(20),
        },
        ProductionRow {
            id: 3,
            company_id: "globex".into(),
            name: "Hostile Takeover".into(),
            created_at: at(10),
        },
    ]
}

pub const OBJECTS: &[&str] = &[
    "companies/acme/productions/1/script.pdf",
    "companies/acme/productions/1/callsheet.pdf",
    "companies/acme/productions/2/budget.xlsx",
    "companies/acme/productions/12/notes.txt",
    "companies/globex/productions/1/leak.pdf",
    "companies/globex/productions/3/plan.pdf",
];

pub fn users() -> Vec<UserRow> {
    let hash = |pw: &str| bcrypt::hash(pw, BCRYPT_TEST_COST).unwrap();
    vec![
        UserRow {
            id: 7,
            company_id: "acme".into(),
            username: "alice".into(),
            email: Some("alice@acme.test".into()),
            password_hash: hash("correct"),
        },
        UserRow {
            id: 8,
            company_id: "globex".into(),
            username: "alice".into(),
            email: Some("alice@globex.test".into()),
            password_hash: hash("other"),
        },
    ]
}

// ---- app builders ----

pub fn test_config() -> Config {
    let env: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://localhost/documents_test"),
        ("JWT_SECRET", SECRET),
        ("STORAGE_BUCKET", "documents"),
    ]);
    Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
}

pub fn self_issued_claims() -> ClaimConfig {
    ClaimConfig {
        tenant: "companyId".into(),
        subject: "userId".into(),
        email: "email".into(),
    }
}

pub fn delegated_claims() -> ClaimConfig {
    ClaimConfig {
        tenant: DELEGATED_TENANT_CLAIM.into(),
        subject: "sub".into(),
        email: "email".into(),
    }
}

pub fn self_issued_tokens() -> SelfIssuedTokens {
    SelfIssuedTokens::new(SECRET, 3600, 0, self_issued_claims())
}

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<RecordingStorage>,
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().uri(path);
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }
}

fn assemble(
    verifier: CredentialVerifier,
    claims: ClaimConfig,
    login: Option<LoginService>,
    storage: RecordingStorage,
    health_up: bool,
) -> TestApp {
    let storage = Arc::new(storage);
    let state = AppState::new(
        Arc::new(verifier),
        Arc::new(TenantScoper::new(claims)),
        login.map(Arc::new),
        Arc::new(Productions(productions())),
        storage.clone(),
        Arc::new(Health { up: health_up }),
    );

    TestApp {
        router: build_router(state, &test_config()),
        storage,
    }
}

pub fn self_issued_app_with(storage: RecordingStorage, health_up: bool) -> TestApp {
    let login = LoginService::new(
        Arc::new(Users(users())),
        Arc::new(self_issued_tokens()),
        bcrypt::hash("dummy", BCRYPT_TEST_COST).unwrap(),
    );

    assemble(
        CredentialVerifier::SelfIssued(self_issued_tokens()),
        self_issued_claims(),
        Some(login),
        storage,
        health_up,
    )
}

pub fn self_issued_app() -> TestApp {
    self_issued_app_with(RecordingStorage::new(OBJECTS), true)
}

pub fn delegated_app(jwks_url: Url) -> TestApp {
    let fetcher = HttpJwksFetcher::new(jwks_url, Duration::from_secs(2)).unwrap();
    let cache = JwksCache::new(Arc::new(fetcher), Duration::from_secs(600));
    let verifier = DelegatedVerifier::new(
        Arc::new(cache),
        DelegatedPolicy {
            issuer: ISSUER.into(),
            audience: AUDIENCE.into(),
            algorithms: vec![Algorithm::RS256],
            leeway_seconds: 0,
        },
    );

    assemble(
        CredentialVerifier::Delegated(verifier),
        delegated_claims(),
        None,
        RecordingStorage::new(OBJECTS),
        true,
    )
}

// ---- identity provider stand-in ----

/// Serve the fixture key set; returns the JWKS URL.
pub async fn serve_jwks() -> Url {
    let app = Router::new().route(
        "/.well-known/jwks.json",
        get(|| async { ([(header::CONTENT_TYPE, "application/json")], JWKS_JSON) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/.well-known/jwks.json")).unwrap()
}

/// A JWKS URL on a port nothing listens on.
pub async fn unreachable_jwks() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/.well-known/jwks.json")).unwrap()
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Claims the authority would mint for an `acme` user.
pub fn delegated_claims_for(tenant: &str) -> Value {
    let mut claims = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "auth0|alice",
        "email": "alice@acme.test",
        "iat": now(),
        "exp": now() + 600,
    });
    claims[DELEGATED_TENANT_CLAIM] = json!(tenant);
    claims
}

pub fn sign_rs256(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}
