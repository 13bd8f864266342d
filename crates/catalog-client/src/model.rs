use serde::{Deserialize, Serialize};

/// Connection lifecycle state, advanced only by [`crate::CatalogClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    LoggedOn,
    LoggedOff,
}

/// Why a connection ended, surfaced on `CatalogEvent::Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Yielded,
    Lost(String),
}

#[derive(Debug, Clone)]
pub enum AuthMode {
    Anonymous,
    Authenticated { refresh_token: String },
}

#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Connected,
    LoggedOn,
    Disconnected { reason: DisconnectReason },
    SessionReplaced,
    Timeout,
    ProductInfo { batch: Vec<AppProductInfo> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotEntry {
    pub depot_id: u32,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppProductInfo {
    pub app_id: u32,
    pub name: String,
    pub depots: Vec<DepotEntry>,
}

/// One frame of a `request_product_info` response. Transports may send
/// several `Batch` frames before the final `Complete`.
#[derive(Debug, Clone)]
pub enum ProductInfoFrame {
    Batch(Vec<AppProductInfo>),
    Complete,
}
