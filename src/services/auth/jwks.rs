//! Signing key set (JWKS) discovery and caching for delegated credentials.
//!
//! The cache lock is never held across the network fetch, so an authority
//! outage only slows the requests that actually need a fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::services::BoxFuture;
use crate::services::auth::verifier::KeyLookupError;

// Upper bound on how often an unknown kid may force a refetch.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Source of the published key set.
pub trait JwksFetcher: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<JwkSet, KeyLookupError>>;
}

/// Fetches `<authority>/.well-known/jwks.json` (or the configured URL) over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    url: Url,
}

impl HttpJwksFetcher {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }
}

impl JwksFetcher for HttpJwksFetcher {
    fn fetch(&self) -> BoxFuture<'_, Result<JwkSet, KeyLookupError>> {
        Box::pin(async move {
            debug!(url = %self.url, "fetching signing key set");

            let res = self
                .client
                .get(self.url.clone())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| {
                    warn!(url = %self.url, error = %e, "signing key set fetch failed");
                    KeyLookupError::Unavailable(e.to_string())
                })?;

            res.json::<JwkSet>().await.map_err(|e| {
                warn!(url = %self.url, error = %e, "signing key set is not a valid JWKS");
                KeyLookupError::Unavailable(e.to_string())
            })
        })
    }
}

struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// TTL cache in front of a `JwksFetcher`. A zero TTL fetches on every lookup.
pub struct JwksCache {
    fetcher: Arc<dyn JwksFetcher>,
    ttl: Duration,
    cached: RwLock<Option<CachedKeySet>>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache").field("ttl", &self.ttl).finish()
    }
}

impl JwksCache {
    pub fn new(fetcher: Arc<dyn JwksFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Key matching `kid`, refreshing the set when it is stale or lacks the kid.
    pub async fn key_for(&self, kid: &str) -> Result<Jwk, KeyLookupError> {
        if let Some((keys, age)) = self.current().await {
            if let Some(jwk) = keys.find(kid) {
                return Ok(jwk.clone());
            }
            // Fresh set without this kid: do not let random kids hammer the authority.
            if age < self.ttl.min(MIN_REFRESH_INTERVAL) {
                return Err(KeyLookupError::UnknownKid(kid.to_string()));
            }
        }

        let keys = self.refresh().await?;
        keys.find(kid)
            .cloned()
            .ok_or_else(|| KeyLookupError::UnknownKid(kid.to_string()))
    }

    // Cached set and its age, if still within the TTL.
    async fn current(&self) -> Option<(Arc<JwkSet>, Duration)> {
        let guard = self.cached.read().await;
        let cached = guard.as_ref()?;
        let age = cached.fetched_at.elapsed();
        (age < self.ttl).then(|| (cached.keys.clone(), age))
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, KeyLookupError> {
        let keys = Arc::new(self.fetcher.fetch().await?);

        if !self.ttl.is_zero() {
            *self.cached.write().await = Some(CachedKeySet {
                keys: keys.clone(),
                fetched_at: Instant::now(),
            });
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router, routing::get};
    use serde_json::json;

    use super::*;

    fn key_set(kids: &[&str]) -> JwkSet {
        let keys: Vec<_> = kids
            .iter()
            .map(|kid| {
                json!({
                    "kty": "RSA",
                    "kid": kid,
                    "use": "sig",
                    "alg": "RS256",
                    "n": "sXch",
                    "e": "AQAB"
                })
            })
            .collect();
        serde_json::from_value(json!({ "keys": keys })).unwrap()
    }

    struct CountingFetcher {
        calls: AtomicUsize,
        kids: Vec<&'static str>,
    }

    impl CountingFetcher {
        fn new(kids: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                kids: kids.to_vec(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl JwksFetcher for CountingFetcher {
        fn fetch(&self) -> BoxFuture<'_, Result<JwkSet, KeyLookupError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(key_set(&self.kids))
            })
        }
    }

    #[tokio::test]
    async fn test_cached_within_ttl() {
        let fetcher = CountingFetcher::new(&["k1"]);
        let cache = JwksCache::new(fetcher.clone(), Duration::from_secs(600));

        cache.key_for("k1").await.unwrap();
        cache.key_for("k1").await.unwrap();

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_fetches_every_time() {
        let fetcher = CountingFetcher::new(&["k1"]);
        let cache = JwksCache::new(fetcher.clone(), Duration::ZERO);

        cache.key_for("k1").await.unwrap();
        cache.key_for("k1").await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_kid_does_not_refetch_fresh_set() {
        let fetcher = CountingFetcher::new(&["k1"]);
        let cache = JwksCache::new(fetcher.clone(), Duration::from_secs(600));

        cache.key_for("k1").await.unwrap();
        let err = cache.key_for("rotated").await.unwrap_err();

        assert!(matches!(err, KeyLookupError::UnknownKid(kid) if kid == "rotated"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_on_first_fetch() {
        let fetcher = CountingFetcher::new(&["k1"]);
        let cache = JwksCache::new(fetcher.clone(), Duration::from_secs(600));

        let err = cache.key_for("nope").await.unwrap_err();
        assert!(matches!(err, KeyLookupError::UnknownKid(_)));
    }

    #[tokio::test]
    async fn test_http_fetcher_reads_published_set() {
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(|| async { Json(serde_json::to_value(key_set(&["k1", "k2"])).unwrap()) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{addr}/.well-known/jwks.json")).unwrap();
        let fetcher = HttpJwksFetcher::new(url, Duration::from_secs(2)).unwrap();

        let set = fetcher.fetch().await.unwrap();
        assert!(set.find("k2").is_some());
    }

    #[tokio::test]
    async fn test_http_fetcher_unreachable() {
        // grab a free port, then close it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/.well-known/jwks.json")).unwrap();
        let fetcher = HttpJwksFetcher::new(url, Duration::from_secs(2)).unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, KeyLookupError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_http_fetcher_error_status() {
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(|| async { axum::http::StatusCode::BAD_GATEWAY }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{addr}/.well-known/jwks.json")).unwrap();
        let fetcher = HttpJwksFetcher::new(url, Duration::from_secs(2)).unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, KeyLookupError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_http_fetcher_gives_up_on_stalled_authority() {
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Json(serde_json::to_value(key_set(&["k1"])).unwrap())
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://{addr}/.well-known/jwks.json")).unwrap();
        let fetcher = HttpJwksFetcher::new(url, Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, KeyLookupError::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
