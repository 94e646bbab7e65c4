//! Keyed JSONB snapshot table

use serde_json::Value;
use tokio_postgres::types::Json;
use tracing::{debug, instrument};

use crate::{DbPool, Result};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS state_snapshots (
        key TEXT PRIMARY KEY,
        body JSONB NOT NULL,
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Whole-state blobs stored one row per key.
///
/// Each save replaces the previous body; there is no history.
#[derive(Clone)]
pub struct SnapshotTable {
    pool: DbPool,
}

impl SnapshotTable {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create the backing table when missing
    pub async fn ensure_table(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(CREATE_TABLE).await?;
        debug!("state_snapshots table ready");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn load(&self, key: &str) -> Result<Option<Value>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT body FROM state_snapshots WHERE key = $1", &[&key])
            .await?;

        Ok(row.map(|r| {
            let Json(body): Json<Value> = r.get(0);
            body
        }))
    }

    #[instrument(skip(self, body))]
    pub async fn save(&self, key: &str, body: &Value) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO state_snapshots (key, body, updated_at)
                VALUES ($1, $2, CURRENT_TIMESTAMP)
                ON CONFLICT (key) DO UPDATE
                SET body = EXCLUDED.body, updated_at = EXCLUDED.updated_at
                "#,
                &[&key, &Json(body)],
            )
            .await?;
        Ok(())
    }

    pub async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}
