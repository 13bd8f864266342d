use async_trait::async_trait;

/// Duck-typed cancellation signal so this crate stays free of a dependency
/// on `operation-registry`. Callers that already hold an
/// `operation_registry::CancellationToken` (whose `is_cancelled`/`cancelled`
/// methods have this exact shape) implement this trait for it at the call
/// site.
#[async_trait]
pub trait CancelSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
    async fn cancelled(&self);
}

/// A signal that never fires. Useful for callers with no cancellation
/// concept of their own, and in tests.
pub struct NeverCancel;

#[async_trait]
impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }

    async fn cancelled(&self) {
        std::future::pending::<()>().await;
    }
}
