//! Bridges `operation_registry::CancellationToken` to the duck-typed
//! `CancelSignal` trait `catalog-client` checks during reconnects. Neither
//! type belongs to this crate, so a local newtype is the only legal place
//! to implement the trait.

use catalog_client::CancelSignal;
use operation_registry::CancellationToken;

pub struct TokenCancel(pub CancellationToken);

#[async_trait::async_trait]
impl CancelSignal for TokenCancel {
    fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    async fn cancelled(&self) {
        self.0.cancelled().await
    }
}
