use crate::cancel::CancelSignal;
use crate::config::CatalogClientConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{AppProductInfo, AuthMode, ConnectionState, DisconnectReason, ProductInfoFrame};
use crate::transport::{CatalogSideEffects, CatalogTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Drives one PICS-like connection. Holds no knowledge of what it is
/// connected to beyond the [`CatalogTransport`] it was built with.
pub struct CatalogClient {
    transport: Arc<dyn CatalogTransport>,
    side_effects: Arc<dyn CatalogSideEffects>,
    config: CatalogClientConfig,
    state: Mutex<ConnectionState>,
    yielding: AtomicBool,
    scan_active: AtomicBool,
}

impl CatalogClient {
    pub fn new(
        transport: Arc<dyn CatalogTransport>,
        side_effects: Arc<dyn CatalogSideEffects>,
        config: CatalogClientConfig,
    ) -> Self {
        Self {
            transport,
            side_effects,
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            yielding: AtomicBool::new(false),
            scan_active: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    pub fn set_scan_active(&self, active: bool) {
        self.scan_active.store(active, Ordering::SeqCst);
    }

    /// Drives `Disconnected -> Connecting -> Connected -> LoggedOn`.
    /// `yielding_hint` forces anonymous mode when a competing local daemon
    /// is already logged on.
    pub async fn connect(&self, mode: AuthMode, yielding_hint: bool) -> CatalogResult<()> {
        let effective_mode = if yielding_hint {
            AuthMode::Anonymous
        } else {
            mode
        };

        *self.state.lock().await = ConnectionState::Connecting;
        tokio::time::timeout(
            self.config.connect_timeout,
            self.transport.connect(&effective_mode),
        )
        .await
        .map_err(|_| CatalogError::Timeout("connect"))??;
        *self.state.lock().await = ConnectionState::Connected;

        tokio::time::timeout(
            self.config.logon_timeout,
            self.transport.logon(&effective_mode),
        )
        .await
        .map_err(|_| CatalogError::Timeout("logon"))??;
        *self.state.lock().await = ConnectionState::LoggedOn;

        Ok(())
    }

    /// Drains every frame of a batched product-info query before returning.
    /// A request that yields no frames at all is `Transient`, never
    /// `Invalid` — the catalog service may simply be slow to answer.
    pub async fn get_product_info(&self, app_ids: &[u32]) -> CatalogResult<Vec<AppProductInfo>> {
        let (tx, mut rx) = mpsc::channel(64);
        self.transport.request_product_info(app_ids, tx).await?;

        let mut collected = Vec::new();
        let mut saw_any = false;
        while let Some(frame) = rx.recv().await {
            saw_any = true;
            match frame {
                ProductInfoFrame::Batch(batch) => collected.extend(batch),
                ProductInfoFrame::Complete => break,
            }
        }

        if !saw_any {
            return Err(CatalogError::Transient(
                "no response frames within the request window".to_string(),
            ));
        }
        Ok(collected)
    }

    /// Walks the reconnect backoff table after an unexpected disconnect.
    /// Never touches scan progress — resuming a partial scan at
    /// `remaining_apps` is the Depot Mapping Engine's job.
    pub async fn reconnect(&self, mode: AuthMode, cancel: &dyn CancelSignal) -> CatalogResult<()> {
        *self.state.lock().await = ConnectionState::Disconnected;

        for attempt in 0..self.config.max_reconnect_attempts {
            let delay = self.config.backoff_for_attempt(attempt as usize);
            self.side_effects.on_reconnect_attempt(attempt + 1, delay).await;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(CatalogError::Transient("cancelled during reconnect".to_string())),
            }

            if self.yielding.load(Ordering::SeqCst) {
                continue;
            }

            if self.connect(mode.clone(), false).await.is_ok() {
                return Ok(());
            }
        }

        Err(CatalogError::ReconnectExhausted)
    }

    pub async fn note_unexpected_disconnect(&self, reason: String) {
        *self.state.lock().await = ConnectionState::Disconnected;
        self.side_effects.publish_session_error(&reason).await;
    }

    /// `local_daemon_active` disambiguates a replacement caused by this
    /// same install's other session from a genuine external takeover.
    pub async fn note_session_replaced(&self, local_daemon_active: bool) -> CatalogResult<()> {
        if local_daemon_active {
            return Ok(());
        }

        let count = self.side_effects.note_session_replacement().await;
        if count >= self.config.max_session_replaced_before_logout {
            self.side_effects.clear_credentials().await;
            *self.state.lock().await = ConnectionState::LoggedOff;
            self.side_effects.publish_auto_logout().await;
            return Err(CatalogError::AutoLogout);
        }
        Ok(())
    }

    /// Intentionally disconnects and refuses to reconnect until released.
    /// Models the external daemon's "session ended" signal.
    pub fn set_yielding(&self, yielding: bool) {
        self.yielding.store(yielding, Ordering::SeqCst);
    }

    pub fn is_yielding(&self) -> bool {
        self.yielding.load(Ordering::SeqCst)
    }

    pub async fn disconnect_reason_if_yielding(&self) -> Option<DisconnectReason> {
        if self.is_yielding() {
            Some(DisconnectReason::Yielded)
        } else {
            None
        }
    }

    pub async fn current_change_number(&self) -> CatalogResult<u32> {
        self.transport.current_change_number().await
    }

    pub async fn enumerate_app_ids(&self, since_change_number: Option<u32>) -> CatalogResult<Vec<u32>> {
        self.transport.enumerate_app_ids(since_change_number).await
    }
}
