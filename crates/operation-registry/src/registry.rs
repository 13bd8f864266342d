use crate::cancellation::CancellationToken;
use crate::model::{LiveRecord, OperationKind, OperationRecord, OperationStatus};
use chrono::Utc;
use gamecache_config::{atomic_write, CoreError, CoreResult, Paths};
use push_bus::{events, Group, PushBus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Background sweep cadence for pruning retained terminal records.
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

struct Inner {
    paths: Paths,
    bus: PushBus,
    live: Mutex<HashMap<String, LiveRecord>>,
}

/// Process-wide registry of named, cancelable jobs.
#[derive(Clone)]
pub struct OperationRegistry {
    inner: Arc<Inner>,
}

impl OperationRegistry {
    /// Loads persisted history, fails over any record left non-terminal by
    /// a prior crash, and starts the retention sweep loop.
    pub async fn new(paths: Paths, bus: PushBus) -> CoreResult<Self> {
        paths.ensure_dirs()?;

        let mut history = load_records(&paths.operation_history_file())?;
        let mut cache_ops = load_records(&paths.cache_operations_file())?;

        let mut crashed = 0;
        for record in history.iter_mut().chain(cache_ops.iter_mut()) {
            if !record.status.is_terminal() {
                record.status = OperationStatus::Failed;
                record.error = Some("interrupted by restart".to_string());
                record.ended_utc = Some(Utc::now());
                crashed += 1;
            }
        }
        if crashed > 0 {
            tracing::warn!(crashed, "failed over operations orphaned by a prior crash");
        }

        save_records(&paths.operation_history_file(), &history)?;
        save_records(&paths.cache_operations_file(), &cache_ops)?;

        let live = history
            .into_iter()
            .chain(cache_ops)
            .map(|record| {
                (
                    record.id.clone(),
                    LiveRecord {
                        record,
                        cancel: CancellationToken::new(),
                    },
                )
            })
            .collect();

        let inner = Arc::new(Inner {
            paths,
            bus,
            live: Mutex::new(live),
        });

        let registry = Self { inner };
        registry.spawn_retention_sweep();
        Ok(registry)
    }

    fn spawn_retention_sweep(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let now = Utc::now();
                let mut live = inner.live.lock().await;
                live.retain(|_, entry| {
                    if !entry.record.status.is_terminal() {
                        return true;
                    }
                    let ended = entry.record.ended_utc.unwrap_or(now);
                    now - ended < entry.record.kind.retention()
                });
            }
        });
    }

    /// Register a new operation. Fails with `CoreError::Conflict` if a
    /// running record of the same kind (and, for scoped kinds, the same
    /// scope) already exists.
    pub async fn register(
        &self,
        kind: OperationKind,
        label: impl Into<String>,
        scope: Option<String>,
    ) -> CoreResult<OperationHandle> {
        let mut live = self.inner.live.lock().await;

        let conflict = live.values().any(|entry| {
            entry.record.kind == kind
                && !entry.record.status.is_terminal()
                && (kind.is_singleton() || entry.record.scope == scope)
        });
        if conflict {
            return Err(CoreError::Conflict(format!(
                "{} is already running{}",
                kind.as_str(),
                scope.as_deref().map(|s| format!(" for {s}")).unwrap_or_default()
            )));
        }

        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let record = OperationRecord {
            id: id.clone(),
            kind,
            status: OperationStatus::Running,
            scope,
            label: label.into(),
            started_utc: Utc::now(),
            ended_utc: None,
            last_message: String::new(),
            last_percent: 0.0,
            error: None,
        };
        live.insert(
            id.clone(),
            LiveRecord {
                record: record.clone(),
                cancel: cancel.clone(),
            },
        );
        self.persist_locked(&live)?;
        drop(live);

        self.inner
            .bus
            .publish(Group::All, events::job_started(kind.as_str(), &id))
            .await;

        Ok(OperationHandle {
            id,
            kind,
            registry: self.clone(),
            cancel,
        })
    }

    pub async fn cancel(&self, id: &str) -> CoreResult<()> {
        let live = self.inner.live.lock().await;
        match live.get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                Ok(())
            }
            None => Err(CoreError::Invalid(format!("no such operation {id}"))),
        }
    }

    pub async fn list(&self) -> Vec<OperationRecord> {
        self.inner
            .live
            .lock()
            .await
            .values()
            .map(|entry| entry.record.clone())
            .collect()
    }

    async fn set_progress(&self, id: &str, percent: f64, message: String, extra: serde_json::Value) -> CoreResult<()> {
        let kind;
        {
            let mut live = self.inner.live.lock().await;
            let entry = live
                .get_mut(id)
                .ok_or_else(|| CoreError::Invalid(format!("no such operation {id}")))?;

            let clamped = percent.max(entry.record.last_percent);
            if clamped != percent {
                tracing::warn!(id, percent, clamped, "progress regression clamped");
            }
            entry.record.last_percent = clamped;
            entry.record.last_message = message.clone();
            kind = entry.record.kind;
            self.persist_locked(&live)?;
        }

        let mut event = events::job_progress(kind.as_str(), id, percent.max(0.0), &message);
        merge_extra(&mut event.payload, extra);
        self.inner.bus.publish(Group::All, event).await;
        Ok(())
    }

    async fn complete(
        &self,
        id: &str,
        status: OperationStatus,
        error: Option<String>,
        extra: serde_json::Value,
    ) -> CoreResult<()> {
        let kind;
        {
            let mut live = self.inner.live.lock().await;
            let entry = live
                .get_mut(id)
                .ok_or_else(|| CoreError::Invalid(format!("no such operation {id}")))?;

            entry.record.status = status;
            entry.record.ended_utc = Some(Utc::now());
            entry.record.error = error.clone();
            if status == OperationStatus::Completed {
                entry.record.last_percent = 100.0;
            }
            kind = entry.record.kind;
            self.persist_locked(&live)?;
        }

        let success = status == OperationStatus::Completed;
        let mut event = events::job_complete(kind.as_str(), id, success, error.as_deref());
        merge_extra(&mut event.payload, extra);
        self.inner.bus.publish(Group::All, event).await;
        Ok(())
    }

    fn persist_locked(&self, live: &HashMap<String, LiveRecord>) -> CoreResult<()> {
        let (cache_ops, history): (Vec<_>, Vec<_>) = live
            .values()
            .map(|entry| entry.record.clone())
            .partition(|record| record.kind.uses_cache_operations_file());

        save_records(&self.inner.paths.operation_history_file(), &history)?;
        save_records(&self.inner.paths.cache_operations_file(), &cache_ops)?;
        Ok(())
    }
}

fn merge_extra(payload: &mut serde_json::Value, extra: serde_json::Value) {
    if let (Some(payload_obj), serde_json::Value::Object(extra_obj)) =
        (payload.as_object_mut(), extra)
    {
        for (k, v) in extra_obj {
            payload_obj.insert(k, v);
        }
    }
}

fn load_records(path: &std::path::Path) -> CoreResult<Vec<OperationRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&raw)?)
}

fn save_records(path: &std::path::Path, records: &[OperationRecord]) -> CoreResult<()> {
    let serialized = serde_json::to_string_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    atomic_write(path, &tmp, &serialized)
}

/// Held by the runner that created an operation. Used to report progress
/// and final outcome, and to observe cooperative cancellation. Cloning is
/// cheap (an id, an `Arc`-backed registry handle, and a cancellation
/// token) so a caller can hand one clone to the spawned worker and keep
/// another for itself.
#[derive(Clone)]
pub struct OperationHandle {
    id: String,
    kind: OperationKind,
    registry: OperationRegistry,
    cancel: CancellationToken,
}

impl OperationHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn set_progress(&self, percent: f64, message: impl Into<String>) -> CoreResult<()> {
        self.registry
            .set_progress(&self.id, percent, message.into(), serde_json::json!({}))
            .await
    }

    pub async fn set_progress_with(
        &self,
        percent: f64,
        message: impl Into<String>,
        extra: serde_json::Value,
    ) -> CoreResult<()> {
        self.registry
            .set_progress(&self.id, percent, message.into(), extra)
            .await
    }

    pub async fn complete(&self, success: bool, error: Option<String>) -> CoreResult<()> {
        let status = if self.cancel.is_cancelled() {
            OperationStatus::Cancelled
        } else if success {
            OperationStatus::Completed
        } else {
            OperationStatus::Failed
        };
        self.registry
            .complete(&self.id, status, error, serde_json::json!({}))
            .await
    }

    pub async fn complete_with(
        &self,
        success: bool,
        error: Option<String>,
        extra: serde_json::Value,
    ) -> CoreResult<()> {
        let status = if self.cancel.is_cancelled() {
            OperationStatus::Cancelled
        } else if success {
            OperationStatus::Completed
        } else {
            OperationStatus::Failed
        };
        self.registry.complete(&self.id, status, error, extra).await
    }
}
