mod cancel;
mod client;
mod config;
mod error;
mod model;
mod transport;

pub use cancel::{CancelSignal, NeverCancel};
pub use client::CatalogClient;
pub use config::{CatalogClientConfig, DEFAULT_RECONNECT_BACKOFF_SECS};
pub use error::{CatalogError, CatalogResult};
pub use model::{
    AppProductInfo, AuthMode, CatalogEvent, ConnectionState, DepotEntry, DisconnectReason,
    ProductInfoFrame,
};
pub use transport::{testing, CatalogSideEffects, CatalogTransport};
