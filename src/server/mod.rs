//! Authority HTTP server.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

pub use routes::{AppState, CallbackParams, create_router};

use crate::config::Config;
use crate::{Error, Result};

/// The authority service: login routes plus the key-set endpoint.
pub struct AuthorityServer {
    config: Config,
    state: Arc<AppState>,
}

impl AuthorityServer {
    /// Validate configuration and wire the service.
    pub fn new(config: Config) -> Result<Self> {
        config.validate_for_serving()?;
        let state = Arc::new(AppState::from_config(&config)?);
        Ok(Self { config, state })
    }

    /// Bind and serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address: {e}")))?;

        let app = create_router(Arc::clone(&self.state), &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %addr,
            provider = %self.state.flow.provider_name(),
            "Trust authority listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Trust authority stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
