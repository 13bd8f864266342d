use std::time::Duration;

/// Mirrors `message-sync-retriable-worker`'s backoff idiom: a fixed step
/// table rather than a computed exponential, so the sequence is exactly
/// reproducible in tests.
pub const DEFAULT_RECONNECT_BACKOFF_SECS: &[u64] = &[5, 10, 20, 40, 60];

#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    pub connect_timeout: Duration,
    pub logon_timeout: Duration,
    pub reconnect_backoff: Vec<Duration>,
    pub max_reconnect_attempts: u32,
    pub max_session_replaced_before_logout: u32,
}

impl CatalogClientConfig {
    pub fn new(max_reconnect_attempts: u32, max_session_replaced_before_logout: u32) -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            logon_timeout: Duration::from_secs(60),
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            max_reconnect_attempts,
            max_session_replaced_before_logout,
        }
    }

    /// The backoff delay for the given zero-indexed attempt, capped at the
    /// table's last entry.
    pub fn backoff_for_attempt(&self, attempt: usize) -> Duration {
        let idx = attempt.min(self.reconnect_backoff.len() - 1);
        self.reconnect_backoff[idx]
    }
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self::new(5, 3)
    }
}
