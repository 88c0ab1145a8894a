use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The gifstash HTTP server.
pub struct GifstashServer {
    config: ServiceConfig,
}

impl GifstashServer {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Open state, bootstrap, and serve until the listener fails.
    pub async fn serve(self) -> ServerResult<()> {
        let bind_addr = self.config.bind_addr;
        let state = AppState::open(self.config)?;
        let report = state.bootstrap()?;
        if let Some(id) = &report.created_admin {
            info!(%id, path = %state.config.admin_token_path().display(), "administrator provisioned");
        }

        let app = build_router(state);
        let listener = TcpListener::bind(bind_addr).await?;
        info!("gifstash listening on {bind_addr}");
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
