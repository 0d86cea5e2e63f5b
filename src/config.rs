/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, CORS 許可、Auth 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - 認証方式 (self-issued / delegated) の選択
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use url::Url;

pub(crate) const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

// bcryptjs default; existing user rows were hashed with it.
const DEFAULT_BCRYPT_COST: u32 = 10;
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Claim keys used to build a Principal (and to mint self-issued tokens).
///
/// The tenant key is configuration because identity providers namespace custom
/// claims (e.g. `https://example.com/company_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimConfig {
    pub tenant: String,
    pub subject: String,
    pub email: String,
}

#[derive(Clone)]
pub struct SelfIssuedConfig {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: u64,
    /// Cost of the dummy hash compared for unknown users. Should match the
    /// cost of the stored hashes so both login paths take the same time.
    pub bcrypt_cost: u32,
}

impl fmt::Debug for SelfIssuedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the secret
        f.debug_struct("SelfIssuedConfig")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct DelegatedConfig {
    pub authority: Url,
    pub issuer: String,
    pub audience: String,
    pub jwks_url: Url,
    pub algorithms: Vec<Algorithm>,
    pub jwks_cache_ttl_seconds: u64,
    pub jwks_timeout_seconds: u64,
}

/// Credential strategy, selected by `AUTH_MODE`.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    SelfIssued(SelfIssuedConfig),
    Delegated(DelegatedConfig),
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: Url,
    // Key file for Application Default Credentials; unset falls back to
    // gcloud user credentials or the metadata server.
    pub credentials_path: Option<String>,
    // Non-Google endpoint with no key file: a local emulator, listed without a token.
    pub anonymous: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout_seconds: u64,

    pub database_url: String,
    pub database_max_connections: u32,

    pub auth: AuthConfig,
    pub claims: ClaimConfig,
    pub access_token_leeway_seconds: u64,

    pub storage: StorageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (env, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port: u16 = parse_or(get("PORT"), 5000, "PORT")?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout_seconds =
            parse_or(get("REQUEST_TIMEOUT_SECONDS"), 30, "REQUEST_TIMEOUT_SECONDS")?;

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections = parse_or(
            get("DATABASE_MAX_CONNECTIONS"),
            10,
            "DATABASE_MAX_CONNECTIONS",
        )?;

        let access_token_leeway_seconds = parse_or(
            get("ACCESS_TOKEN_LEEWAY_SECONDS"),
            60,
            "ACCESS_TOKEN_LEEWAY_SECONDS",
        )?;

        let mode = get("AUTH_MODE")
            .unwrap_or_else(|| "self_issued".to_string())
            .to_ascii_lowercase()
            .replace('-', "_");

        let (auth, claims) = match mode.as_str() {
            "self_issued" | "local" => {
                let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
                let access_token_ttl_seconds = parse_or(
                    get("ACCESS_TOKEN_TTL_SECONDS"),
                    3600,
                    "ACCESS_TOKEN_TTL_SECONDS",
                )?;
                if access_token_ttl_seconds == 0 {
                    return Err(ConfigError::Invalid("ACCESS_TOKEN_TTL_SECONDS"));
                }

                let bcrypt_cost: u32 =
                    parse_or(get("BCRYPT_COST"), DEFAULT_BCRYPT_COST, "BCRYPT_COST")?;
                if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
                    return Err(ConfigError::Invalid("BCRYPT_COST"));
                }

                let claims = ClaimConfig {
                    tenant: get("TENANT_CLAIM").unwrap_or_else(|| "companyId".to_string()),
                    subject: get("SUBJECT_CLAIM").unwrap_or_else(|| "userId".to_string()),
                    email: get("EMAIL_CLAIM").unwrap_or_else(|| "email".to_string()),
                };

                (
                    AuthConfig::SelfIssued(SelfIssuedConfig {
                        jwt_secret,
                        access_token_ttl_seconds,
                        bcrypt_cost,
                    }),
                    claims,
                )
            }
            "delegated" | "jwks" => {
                let authority = get("AUTH_AUTHORITY")
                    .ok_or(ConfigError::Missing("AUTH_AUTHORITY"))
                    .and_then(|raw| parse_authority(&raw))?;

                let audience =
                    get("AUTH_AUDIENCE").ok_or(ConfigError::Missing("AUTH_AUDIENCE"))?;
                let issuer = get("AUTH_ISSUER").unwrap_or_else(|| authority.to_string());

                let jwks_url = match get("JWKS_URL") {
                    Some(raw) => Url::parse(&raw).map_err(|_| ConfigError::Invalid("JWKS_URL"))?,
                    None => authority
                        .join(".well-known/jwks.json")
                        .map_err(|_| ConfigError::Invalid("AUTH_AUTHORITY"))?,
                };

                let algorithms = parse_algorithms(get("AUTH_ALGORITHMS").as_deref())?;

                let jwks_cache_ttl_seconds = parse_or(
                    get("JWKS_CACHE_TTL_SECONDS"),
                    600,
                    "JWKS_CACHE_TTL_SECONDS",
                )?;
                let jwks_timeout_seconds =
                    parse_or(get("JWKS_TIMEOUT_SECONDS"), 5, "JWKS_TIMEOUT_SECONDS")?;
                if jwks_timeout_seconds == 0 {
                    return Err(ConfigError::Invalid("JWKS_TIMEOUT_SECONDS"));
                }

                // No sensible default: the namespace belongs to the identity provider.
                let claims = ClaimConfig {
                    tenant: get("TENANT_CLAIM").ok_or(ConfigError::Missing("TENANT_CLAIM"))?,
                    subject: get("SUBJECT_CLAIM").unwrap_or_else(|| "sub".to_string()),
                    email: get("EMAIL_CLAIM").unwrap_or_else(|| "email".to_string()),
                };

                (
                    AuthConfig::Delegated(DelegatedConfig {
                        authority,
                        issuer,
                        audience,
                        jwks_url,
                        algorithms,
                        jwks_cache_ttl_seconds,
                        jwks_timeout_seconds,
                    }),
                    claims,
                )
            }
            _ => return Err(ConfigError::Invalid("AUTH_MODE")),
        };

        let bucket = get("STORAGE_BUCKET")
            .or_else(|| get("BUCKET_NAME"))
            .ok_or(ConfigError::Missing("STORAGE_BUCKET"))?;
        let endpoint = Url::parse(
            &get("STORAGE_ENDPOINT").unwrap_or_else(|| DEFAULT_STORAGE_ENDPOINT.to_string()),
        )
        .map_err(|_| ConfigError::Invalid("STORAGE_ENDPOINT"))?;

        let credentials_path = get("GOOGLE_APPLICATION_CREDENTIALS");
        let anonymous = credentials_path.is_none() && !is_google_endpoint(&endpoint);
        let storage = StorageConfig {
            bucket,
            endpoint,
            credentials_path,
            anonymous,
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            request_timeout_seconds,
            database_url,
            database_max_connections,
            auth,
            claims,
            access_token_leeway_seconds,
            storage,
        })
    }
}

fn is_google_endpoint(endpoint: &Url) -> bool {
    endpoint
        .host_str()
        .is_some_and(|host| host == "googleapis.com" || host.ends_with(".googleapis.com"))
}

fn parse_or<T: FromStr>(value: Option<String>, default: T, key: &'static str) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

// Accepts `tenant.example.com` as well as `https://tenant.example.com/`.
// The result always ends with `/` so `join` appends instead of replacing.
fn parse_authority(raw: &str) -> Result<Url, ConfigError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let normalized = if with_scheme.ends_with('/') {
        with_scheme
    } else {
        format!("{with_scheme}/")
    };

    let url = Url::parse(&normalized).map_err(|_| ConfigError::Invalid("AUTH_AUTHORITY"))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ConfigError::Invalid("AUTH_AUTHORITY"));
    }
    Ok(url)
}

fn parse_algorithms(raw: Option<&str>) -> Result<Vec<Algorithm>, ConfigError> {
    let raw = raw.unwrap_or("RS256");
    let mut algorithms = Vec::new();

    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name).map_err(|_| ConfigError::Invalid("AUTH_ALGORITHMS"))?;
        if !is_asymmetric(alg) {
            return Err(ConfigError::Invalid("AUTH_ALGORITHMS"));
        }
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::Invalid("AUTH_ALGORITHMS"));
    }
    Ok(algorithms)
}

pub(crate) fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
