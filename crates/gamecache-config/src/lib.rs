//! Shared configuration, paths, error types and logging for the cache
//! keeper control plane.

mod atomic_write;
mod config;
mod error;
mod logging;
mod paths;

pub use atomic_write::atomic_write;
pub use config::{
    Config, CrawlMode, DEFAULT_CRAWL_INTERVAL_HOURS, DEFAULT_DEPOT_BATCH_SIZE, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_SESSION_REPLACED_BEFORE_LOGOUT,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
