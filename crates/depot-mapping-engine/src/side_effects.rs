//! Wires `catalog-client`'s `CatalogSideEffects` seam into the real State
//! Store, Secret Store and push bus.

use async_trait::async_trait;
use catalog_client::CatalogSideEffects;
use chrono::Utc;
use push_bus::{events, Group, PushBus};
use secret_store::SecretStore;
use state_store::StateStore;
use std::sync::Arc;
use std::time::Duration;

pub struct GameCacheSideEffects {
    state: Arc<StateStore>,
    secrets: Arc<SecretStore>,
    bus: PushBus,
}

impl GameCacheSideEffects {
    pub fn new(state: Arc<StateStore>, secrets: Arc<SecretStore>, bus: PushBus) -> Self {
        Self { state, secrets, bus }
    }
}

#[async_trait]
impl CatalogSideEffects for GameCacheSideEffects {
    async fn note_session_replacement(&self) -> u32 {
        match self.state.record_session_replacement(Utc::now()) {
            Ok(snapshot) => snapshot.session_replacement.count,
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist session replacement count");
                0
            }
        }
    }

    async fn clear_credentials(&self) {
        if let Err(err) = self.secrets.clear() {
            tracing::warn!(error = %err, "failed to clear stored credentials");
        }
    }

    async fn publish_auto_logout(&self) {
        self.bus.publish(Group::All, events::steam_auto_logout()).await;
    }

    async fn publish_session_error(&self, message: &str) {
        self.bus.publish(Group::All, events::steam_session_error(message)).await;
    }

    async fn on_reconnect_attempt(&self, attempt: u32, delay: Duration) {
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "catalog reconnect attempt");
    }
}
