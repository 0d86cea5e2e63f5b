/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - 中身は不変の設定 / pool / JWKS cache のみ (Clone は Arc のコピー)
 * - 外部依存は trait object で持つ (tests から in-memory 実装を差し込む)
 */
use std::sync::Arc;

use crate::repos::health_repo::HealthProbe;
use crate::repos::production_repo::ProductionStore;
use crate::services::auth::login::LoginService;
use crate::services::auth::{CredentialVerifier, TenantScoper};
use crate::services::storage::ObjectStorage;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<CredentialVerifier>,
    pub scoper: Arc<TenantScoper>,
    /// `None` in delegated mode; `/login` is not mounted then.
    pub login: Option<Arc<LoginService>>,
    pub productions: Arc<dyn ProductionStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub health: Arc<dyn HealthProbe>,
}

impl AppState {
    pub fn new(
        verifier: Arc<CredentialVerifier>,
        scoper: Arc<TenantScoper>,
        login: Option<Arc<LoginService>>,
        productions: Arc<dyn ProductionStore>,
        storage: Arc<dyn ObjectStorage>,
        health: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            verifier,
            scoper,
            login,
            productions,
            storage,
            health,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("verifier", &self.verifier)
            .field("scoper", &self.scoper)
            .field("login", &self.login.is_some())
            .finish_non_exhaustive()
    }
}
