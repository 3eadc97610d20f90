//! API Server
//!
//! Serves the REST router until shutdown is signalled.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

use super::rest::RestRouter;
use crate::entity::EntityService;
use crate::typeahead::TypeaheadResolver;

// =============================================================================
// Server Configuration
// =============================================================================

/// Bind addresses for the API, health and metrics listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
    /// Health server bind address
    pub health_addr: SocketAddr,
    /// Metrics server bind address
    pub metrics_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8090)),
            health_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8081)),
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

pub struct ApiServer {
    config: ApiServerConfig,
    resolver: Arc<TypeaheadResolver>,
    entities: Arc<EntityService>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(
        config: ApiServerConfig,
        resolver: Arc<TypeaheadResolver>,
        entities: Arc<EntityService>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            resolver,
            entities,
            shutdown_tx,
        }
    }

    /// Run the API server until shutdown
    pub async fn run(&self) -> Result<()> {
        info!("Starting REST API on {}", self.config.rest_addr);

        let addr = self.config.rest_addr;
        let router = RestRouter::new(self.resolver.clone(), self.entities.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move { run_rest_server(addr, router, shutdown_rx).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("REST server task failed: {:?}", e);
                Err(Error::Internal(format!("REST server task failed: {}", e)))
            }
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Handle for triggering shutdown from another task
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

async fn run_rest_server(
    addr: SocketAddr,
    router: RestRouter,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let app = router.build();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;

    info!("REST API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("REST server shutting down");
        })
        .await
        .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

    Ok(())
}
