//! Google Cloud Storage object listing over the JSON API.
//!
//! Only what the files endpoint needs: list object names under a prefix.
//! Access tokens come from Application Default Credentials (key file,
//! `gcloud` user credentials or the metadata server). Only an explicit
//! non-Google endpoint without a key file (local emulators) lists anonymously.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::StorageConfig;
use crate::services::BoxFuture;
use crate::services::storage::{ObjectStorage, StorageError, StoragePrefix};

const READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";

/// Source of OAuth access tokens for the storage API.
pub trait AccessTokenSource: Send + Sync {
    fn token(&self) -> BoxFuture<'_, Result<String, StorageError>>;
}

/// Application Default Credentials via `gcp_auth`, which also caches and
/// refreshes the token.
pub struct AdcTokenSource {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl AdcTokenSource {
    pub async fn discover() -> Result<Self, StorageError> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| StorageError::Credentials(e.to_string()))?;
        Ok(Self { provider })
    }
}

impl AccessTokenSource for AdcTokenSource {
    fn token(&self) -> BoxFuture<'_, Result<String, StorageError>> {
        Box::pin(async move {
            let token = self
                .provider
                .token(&[READ_ONLY_SCOPE])
                .await
                .map_err(|e| StorageError::Token(e.to_string()))?;
            Ok(token.as_str().to_string())
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectItem {
    name: String,
}

pub struct GcsStorage {
    client: reqwest::Client,
    objects_url: Url,
    auth: Option<Arc<dyn AccessTokenSource>>,
}

impl std::fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorage")
            .field("objects_url", &self.objects_url.as_str())
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

impl GcsStorage {
    pub fn new(
        client: reqwest::Client,
        endpoint: &Url,
        bucket: &str,
        auth: Option<Arc<dyn AccessTokenSource>>,
    ) -> Result<Self, StorageError> {
        let mut objects_url = endpoint.clone();
        objects_url
            .path_segments_mut()
            .map_err(|_| StorageError::Credentials("storage endpoint cannot be a base url".into()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o"]);

        Ok(Self {
            client,
            objects_url,
            auth,
        })
    }

    pub async fn from_config(
        config: &StorageConfig,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let auth: Option<Arc<dyn AccessTokenSource>> = if config.anonymous {
            warn!(endpoint = %config.endpoint, "storage emulator endpoint without credentials; listing anonymously");
            None
        } else {
            info!(
                credentials = config.credentials_path.as_deref().unwrap_or("ambient"),
                "using application default credentials for storage"
            );
            Some(Arc::new(AdcTokenSource::discover().await?))
        };

        Self::new(client, &config.endpoint, &config.bucket, auth)
    }

    async fn list_all(&self, prefix: &StoragePrefix) -> Result<Vec<String>, StorageError> {
        let bearer = match &self.auth {
            Some(auth) => Some(auth.token().await?),
            None => None,
        };

        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(self.objects_url.clone())
                .query(&[("prefix", prefix.as_str()), ("fields", "items(name),nextPageToken")]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            if let Some(bearer) = &bearer {
                req = req.bearer_auth(bearer);
            }

            let res = req.send().await?;
            if !res.status().is_success() {
                return Err(StorageError::Status(res.status().as_u16()));
            }

            let page: ObjectList = res.json().await?;
            keys.extend(page.items.into_iter().map(|o| o.name));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(prefix = %prefix, count = keys.len(), "listed storage objects");
        Ok(keys)
    }
}

impl ObjectStorage for GcsStorage {
    fn list_keys<'a>(
        &'a self,
        prefix: &'a StoragePrefix,
    ) -> BoxFuture<'a, Result<Vec<String>, StorageError>> {
        Box::pin(self.list_all(prefix))
    }
}
