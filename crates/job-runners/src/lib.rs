//! The job runners: the small set of long-running, cancelable operations
//! `gamecache-daemon` exposes beyond depot mapping (which lives in
//! `depot-mapping-engine`) — cache clearing, corruption detection and
//! repair, log housekeeping, and database reset.

mod cache_clear;
mod corruption;
mod database_reset;
mod logs;
mod subprocess;

pub use cache_clear::{CacheClearRunner, CacheScope};
pub use corruption::{
    CorruptionManagerPort, CorruptionRunner, CorruptionSummary, SubprocessCorruptionManager,
};
pub use corruption::testing as corruption_testing;
pub use database_reset::{DatabaseResetRunner, ResetTable};
pub use logs::{is_valid_service_name, LogCount, LogManagerPort, LogRunner, SubprocessLogManager};
pub use logs::testing as logs_testing;
pub use subprocess::ToolOutput;
