use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::broadcast;

use stockroom_core::TenantId;
use stockroom_infra::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};
use stockroom_inventory::InventoryMovement;

use crate::app::dto;

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Application services shared by all handlers.
///
/// Movement events are published after the store has committed; the broadcast
/// is lossy and puts no backpressure on stock mutation.
pub struct AppServices {
    store: Arc<dyn InventoryStore>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        // Lossy broadcast, tenant-filtered in the SSE handler.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
        Self { store, realtime_tx }
    }

    pub fn store(&self) -> &dyn InventoryStore {
        self.store.as_ref()
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Publish a realtime event (lossy; no backpressure on the core).
    pub fn publish(&self, tenant_id: TenantId, topic: &str, payload: serde_json::Value) {
        let _ = self.realtime_tx.send(RealtimeMessage {
            tenant_id,
            topic: topic.to_string(),
            payload,
        });
    }

    /// Publish committed movement records to the audit stream.
    pub fn publish_movements(&self, movements: &[InventoryMovement]) {
        for movement in movements {
            self.publish(
                movement.tenant_id,
                "inventory.movement_recorded",
                dto::movement_to_json(movement),
            );
        }
    }
}

/// Build services from the environment.
///
/// `USE_PERSISTENT_STORES=true` selects the Postgres backend (requires
/// `DATABASE_URL`); anything else runs the in-memory store for dev/test.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to Postgres");

        let store = PostgresInventoryStore::new(pool);
        store
            .run_migrations()
            .await
            .expect("Failed to run database migrations");
        AppServices::new(Arc::new(store))
    } else {
        AppServices::new(Arc::new(InMemoryInventoryStore::new()))
    }
}
