//! Address Campaign service binary

use address_campaign::assistant::GeminiClient;
use address_campaign::persistence::{
    FileSnapshotStore, MemorySnapshotStore, PgSnapshotStore, SnapshotStore,
};
use address_campaign::handlers::SERVICE_ID;
use address_campaign::webhook::WebhookDispatcher;
use address_campaign::{create_router, AppState, CampaignConfig, CampaignService, StateBackend};
use gofor_core::{GoforError, GoforService, MicroserviceRuntime, Result};
use gofor_store::{DbPool, PoolConfig, SnapshotTable};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gofor_telemetry::init(SERVICE_ID)?;

    info!("Starting Address Campaign service");

    let service = Arc::new(AddressCampaignService::new().await?);
    MicroserviceRuntime::run(service).await?;
    Ok(())
}

/// Address campaign service state
pub struct AddressCampaignService {
    config: CampaignConfig,
    state: AppState,
}

impl AddressCampaignService {
    pub async fn new() -> anyhow::Result<Self> {
        let config = CampaignConfig::from_env()?;

        let store = open_store(&config).await?;
        let assistant = Arc::new(GeminiClient::new(&config.gemini)?);
        let webhooks = WebhookDispatcher::new(config.webhook_timeout_secs)?;

        let campaign =
            CampaignService::load(store, assistant, webhooks, config.session_phone.clone())
                .await?;
        let state = AppState::new(campaign, config.static_dir.clone());

        Ok(Self { config, state })
    }
}

async fn open_store(config: &CampaignConfig) -> anyhow::Result<Arc<dyn SnapshotStore>> {
    let store: Arc<dyn SnapshotStore> = match config.state_backend {
        StateBackend::File => Arc::new(FileSnapshotStore::new(&config.state_dir)),
        StateBackend::Memory => Arc::new(MemorySnapshotStore::new()),
        StateBackend::Postgres => {
            let pool = DbPool::new(PoolConfig {
                url: config.database_url.clone(),
                max_size: config.db_pool_size,
            })?;
            Arc::new(PgSnapshotStore::connect(SnapshotTable::new(pool)).await?)
        }
    };
    info!(backend = store.backend(), "Snapshot store ready");
    Ok(store)
}

#[async_trait::async_trait]
impl GoforService for AddressCampaignService {
    fn service_id(&self) -> &'static str {
        SERVICE_ID
    }

    async fn shutdown(&self) -> Result<()> {
        info!(
            contacts = self.state.campaign.metrics().total,
            "Shutting down Address Campaign service"
        );
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        info!(
            http = %self.config.http_bind,
            static_dir = %self.config.static_dir.display(),
            model = %self.config.gemini.model,
            "Starting HTTP server"
        );

        let app = create_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(&self.config.http_bind).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| GoforError::Internal(format!("HTTP server failed: {}", e)))?;

        Ok(())
    }
}
