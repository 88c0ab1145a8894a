use std::sync::Arc;

use gifstash_gate::{
    bootstrap, AccountStore, BootstrapReport, FileTokenSink, PolicyEngine, RequestPipeline,
};
use gifstash_store::{Database, StoreError, TenantCache};
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::ServerResult;
use crate::fetch::{HttpFetcher, PayloadFetcher};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub accounts: AccountStore,
    pub policy: Arc<PolicyEngine>,
    pub cache: TenantCache,
    pub pipeline: Arc<RequestPipeline>,
    pub fetcher: Arc<dyn PayloadFetcher>,
}

impl AppState {
    /// Open the configuration store and build the request pipeline.
    ///
    /// Must run inside a Tokio runtime; the tenant cache spawns its evictor.
    pub fn open(config: ServiceConfig) -> ServerResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.config_store_path();
        let db = Database::create(&path).map_err(StoreError::from)?;
        info!(path = %path.display(), "opened configuration store");

        let db = Arc::new(db);
        let accounts = AccountStore::open(db.clone())?;
        let policy = Arc::new(PolicyEngine::open(db)?);
        let cache = TenantCache::new(&config.data_dir, config.eviction_grace());
        let pipeline = RequestPipeline::with_default_stages(
            accounts.clone(),
            policy.clone(),
            cache.clone(),
            config.skip_auth,
        );
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;

        Ok(Self {
            config: Arc::new(config),
            accounts,
            policy,
            cache,
            pipeline: Arc::new(pipeline),
            fetcher: Arc::new(fetcher),
        })
    }

    /// Replace the remote payload fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PayloadFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Seed the configured rules and provision the administrator if needed.
    pub fn bootstrap(&self) -> ServerResult<BootstrapReport> {
        let sink = FileTokenSink::new(self.config.admin_token_path());
        let report = bootstrap(&self.accounts, &self.policy, &self.config.rules, &sink)?;
        Ok(report)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
