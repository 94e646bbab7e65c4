//! Service infrastructure shared by every GoFor360 process

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{GoforError, Result};

/// `/health` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub service_id: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// `/ready` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub dependencies: Vec<DependencyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub available: bool,
    pub latency_ms: Option<u64>,
}

/// Lifecycle every service process implements
#[async_trait]
pub trait GoforService: Send + Sync + 'static {
    /// Service identifier (e.g., "address-campaign")
    fn service_id(&self) -> &'static str;

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Serve until the work is done or fails. An `Err` ends the process.
    async fn start(&self) -> Result<()>;

    /// Called once, after a shutdown signal or after `start` returned
    async fn shutdown(&self) -> Result<()>;
}

/// Standard service runtime bootstrap
pub struct MicroserviceRuntime {
    config: ServiceConfig,
    start_time: std::time::Instant,
}

impl MicroserviceRuntime {
    /// Create new runtime from environment
    pub fn new() -> Result<Self> {
        let config = ServiceConfig::from_env()?;
        Ok(Self {
            config,
            start_time: std::time::Instant::now(),
        })
    }

    /// Run `service` until a shutdown signal arrives or `start` returns.
    ///
    /// A failing `start` is returned to the caller so the process exits
    /// non-zero instead of idling without a server.
    pub async fn run<S: GoforService>(service: Arc<S>) -> Result<()> {
        let runtime = Self::new()?;
        runtime.supervise(service, Self::wait_for_shutdown()).await
    }

    async fn supervise<S, F>(&self, service: Arc<S>, shutdown_signal: F) -> Result<()>
    where
        S: GoforService,
        F: std::future::Future<Output = ()>,
    {
        info!(
            service_id = service.service_id(),
            service_name = %self.config.service_name,
            http_bind = %self.config.http_bind,
            version = service.version(),
            "Starting service"
        );

        let runner = service.clone();
        let mut service_handle = tokio::spawn(async move { runner.start().await });

        let outcome = tokio::select! {
            _ = shutdown_signal => {
                info!("Shutdown signal received, gracefully stopping...");
                Ok(())
            }
            joined = &mut service_handle => match joined {
                Ok(Ok(())) => {
                    warn!("Service returned before any shutdown signal");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Service failed");
                    Err(e)
                }
                Err(e) => Err(GoforError::Internal(format!("Service task aborted: {}", e))),
            },
        };

        if let Err(e) = service.shutdown().await {
            warn!("Error during shutdown: {}", e);
        }

        service_handle.abort();

        info!(
            uptime_seconds = self.start_time.elapsed().as_secs(),
            "Service stopped"
        );

        outcome
    }

    async fn wait_for_shutdown() {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
