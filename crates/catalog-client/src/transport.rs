use crate::error::CatalogResult;
use crate::model::{AuthMode, ProductInfoFrame};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Isolates the real Steam-like catalog service, which is an out-of-scope
/// external collaborator. Production code implements this against the
/// actual network protocol; tests use [`testing::InMemoryTransport`].
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    async fn connect(&self, mode: &AuthMode) -> CatalogResult<()>;
    async fn logon(&self, mode: &AuthMode) -> CatalogResult<()>;

    /// Feeds `tx` zero or more `Batch` frames followed by one `Complete`
    /// frame. Returns once every frame for this request has been sent, not
    /// once the caller has drained them.
    async fn request_product_info(
        &self,
        app_ids: &[u32],
        tx: mpsc::Sender<ProductInfoFrame>,
    ) -> CatalogResult<()>;

    /// The remote's current change number, used to size the gap against a
    /// locally stored watermark before committing to an incremental scan.
    async fn current_change_number(&self) -> CatalogResult<u32>;

    /// The candidate app ids a scan should walk: the full catalog when
    /// `since_change_number` is `None`, or only the apps that changed
    /// since that change number otherwise.
    async fn enumerate_app_ids(&self, since_change_number: Option<u32>) -> CatalogResult<Vec<u32>>;
}

/// Notifies the side effects a production deployment wires into the State
/// Store, Secret Store, and push bus. Kept as a trait so `catalog-client`
/// has no dependency on those crates.
#[async_trait]
pub trait CatalogSideEffects: Send + Sync {
    /// Records a session-replacement event and returns the updated count.
    async fn note_session_replacement(&self) -> u32;
    async fn clear_credentials(&self);
    async fn publish_auto_logout(&self);
    async fn publish_session_error(&self, message: &str);
    async fn on_reconnect_attempt(&self, attempt: u32, delay: std::time::Duration);
}

pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Deterministic transport double. Connect/logon results and the
    /// product-info frames to emit are configured up front; call counts are
    /// observable for assertions.
    pub struct InMemoryTransport {
        pub connect_result: Mutex<Option<CatalogResult<()>>>,
        /// When true, every `connect` call fails, unlike `connect_result`
        /// which is consumed on first use. Lets reconnect tests exhaust
        /// every attempt deterministically.
        pub connect_always_fails: std::sync::atomic::AtomicBool,
        pub logon_result: Mutex<Option<CatalogResult<()>>>,
        pub frames: Mutex<Vec<ProductInfoFrame>>,
        pub change_number: AtomicU32,
        pub app_ids: Mutex<Vec<u32>>,
        pub connect_calls: AtomicU32,
        pub logon_calls: AtomicU32,
        pub request_calls: AtomicU32,
    }

    impl InMemoryTransport {
        pub fn new() -> Self {
            Self {
                connect_result: Mutex::new(Some(Ok(()))),
                connect_always_fails: std::sync::atomic::AtomicBool::new(false),
                logon_result: Mutex::new(Some(Ok(()))),
                frames: Mutex::new(vec![ProductInfoFrame::Complete]),
                change_number: AtomicU32::new(0),
                app_ids: Mutex::new(Vec::new()),
                connect_calls: AtomicU32::new(0),
                logon_calls: AtomicU32::new(0),
                request_calls: AtomicU32::new(0),
            }
        }

        pub fn with_app_ids(self, app_ids: Vec<u32>) -> Self {
            *self.app_ids.lock().unwrap() = app_ids;
            self
        }

        pub fn with_frames(self, frames: Vec<ProductInfoFrame>) -> Self {
            *self.frames.lock().unwrap() = frames;
            self
        }

        pub fn always_failing_connect(self) -> Self {
            self.connect_always_fails.store(true, Ordering::SeqCst);
            self
        }

        pub fn with_change_number(self, number: u32) -> Self {
            self.change_number.store(number, Ordering::SeqCst);
            self
        }
    }

    impl Default for InMemoryTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CatalogTransport for InMemoryTransport {
        async fn connect(&self, _mode: &AuthMode) -> CatalogResult<()> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if self.connect_always_fails.load(Ordering::SeqCst) {
                return Err(crate::error::CatalogError::Transient("down".to_string()));
            }
            self.connect_result.lock().unwrap().take().unwrap_or(Ok(()))
        }

        async fn logon(&self, _mode: &AuthMode) -> CatalogResult<()> {
            self.logon_calls.fetch_add(1, Ordering::SeqCst);
            self.logon_result.lock().unwrap().take().unwrap_or(Ok(()))
        }

        async fn request_product_info(
            &self,
            _app_ids: &[u32],
            tx: mpsc::Sender<ProductInfoFrame>,
        ) -> CatalogResult<()> {
            self.request_calls.fetch_add(1, Ordering::SeqCst);
            let frames = self.frames.lock().unwrap().clone();
            for frame in frames {
                let _ = tx.send(frame).await;
            }
            Ok(())
        }

        async fn current_change_number(&self) -> CatalogResult<u32> {
            Ok(self.change_number.load(Ordering::SeqCst))
        }

        async fn enumerate_app_ids(&self, _since_change_number: Option<u32>) -> CatalogResult<Vec<u32>> {
            Ok(self.app_ids.lock().unwrap().clone())
        }
    }

    /// No-op side effects double that records what it was told.
    pub struct RecordingSideEffects {
        pub replacement_count: AtomicU32,
        pub cleared: AtomicU32,
        pub auto_logouts: AtomicU32,
        pub reconnect_attempts: Mutex<Vec<(u32, std::time::Duration)>>,
    }

    impl RecordingSideEffects {
        pub fn new() -> Self {
            Self {
                replacement_count: AtomicU32::new(0),
                cleared: AtomicU32::new(0),
                auto_logouts: AtomicU32::new(0),
                reconnect_attempts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Default for RecordingSideEffects {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CatalogSideEffects for RecordingSideEffects {
        async fn note_session_replacement(&self) -> u32 {
            self.replacement_count.fetch_add(1, Ordering::SeqCst) + 1
        }

        async fn clear_credentials(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }

        async fn publish_auto_logout(&self) {
            self.auto_logouts.fetch_add(1, Ordering::SeqCst);
        }

        async fn publish_session_error(&self, _message: &str) {}

        async fn on_reconnect_attempt(&self, attempt: u32, delay: std::time::Duration) {
            self.reconnect_attempts.lock().unwrap().push((attempt, delay));
        }
    }
}
