//! Fixed-cadence tick loop that decides when the Depot Mapping Engine
//! should run an automatic scan.

use chrono::Utc;
use depot_mapping_engine::{DepotMappingEngine, RequestOrigin, ScanMode};
use gamecache_config::CrawlMode;
use state_store::StateStore;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub struct Scheduler {
    state: Arc<StateStore>,
    engine: Arc<DepotMappingEngine>,
}

impl Scheduler {
    pub fn new(state: Arc<StateStore>, engine: Arc<DepotMappingEngine>) -> Self {
        Self { state, engine }
    }

    /// Spawns the tick loop. Shutdown is cooperative: the task exits as
    /// soon as `shutdown` resolves, mid-tick work is never interrupted.
    pub fn spawn(self, mut shutdown: oneshot::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(TICK_INTERVAL);
            // The first tick fires immediately; skip it so an overdue scan
            // at startup waits for the next natural tick instead of firing
            // the moment the loop starts.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }

            debug!("Scheduler task stopped");
        })
    }

    async fn tick(&self) {
        let scheduling = self.state.get().scheduling;

        if scheduling.crawl_interval_hours == 0.0 {
            return;
        }

        let now = Utc::now();
        let interval_duration = chrono::Duration::milliseconds(
            (scheduling.crawl_interval_hours * 3_600_000.0) as i64,
        );
        // No prior crawl means it is unconditionally due.
        if let Some(last) = scheduling.last_pics_crawl_utc {
            if now - last < interval_duration {
                return;
            }
        }

        let mode = match scheduling.crawl_mode {
            CrawlMode::Artifact => ScanMode::Artifact,
            CrawlMode::Incremental => ScanMode::Incremental,
            CrawlMode::Full => ScanMode::Full,
        };

        match self.engine.start(mode, RequestOrigin::Automatic).await {
            Ok(Some(_handle)) => {
                if let Err(err) = self.state.set_last_pics_crawl(now) {
                    warn!(error = %err, "failed to persist last_pics_crawl_utc after starting a scan");
                }
            }
            Ok(None) => {
                debug!("automatic scan skipped by viability check, timer left unchanged");
            }
            Err(err) => {
                warn!(error = %err, "failed to start automatic scan");
            }
        }
    }
}
