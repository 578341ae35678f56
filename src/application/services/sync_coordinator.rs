use crate::application::ports::{RemoteStore, REMOTE_ID_FIELD};
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::connectivity_monitor::ConnectivityMonitor;
use crate::application::services::context::SyncContext;
use crate::application::services::id_mapping::IdMappingTable;
use crate::domain::entities::{
    DrainOutcome, DrainReport, DrainTrigger, QueuedAction, SyncStatusSnapshot,
};
use crate::domain::value_objects::{ActionPayload, CollectionName, PartitionKey, RecordId};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::{DrainMetrics, DrainMetricsSnapshot, DrainPassSample};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;

/// 確定済みの対応表をこの期間だけ保持する
const ID_MAPPING_RETENTION_HOURS: i64 = 24;

/// 作成アクションがリモートで確定したとき、キャッシュ内の一時レコードを置き換える
#[async_trait]
pub trait CreateReconciler: Send + Sync {
    async fn reconcile_created(
        &self,
        partition: Option<&PartitionKey>,
        temp_id: &RecordId,
        created: &Value,
    ) -> Result<(), AppError>;
}

/// 排出パスの開始・完了を UI 層へ伝える
pub trait SyncEventSink: Send + Sync {
    fn emit_started(&self, trigger: DrainTrigger, pending: usize) -> Result<(), String>;
    fn emit_completed(&self, report: &DrainReport) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncPhase {
    Idle,
    Draining,
}

struct PhaseState {
    phase: SyncPhase,
    follow_up_requested: bool,
    last_report: Option<DrainReport>,
}

/// 排出中にエラーで抜けた場合でも Idle に戻す
struct DrainingGuard<'a> {
    state: &'a Mutex<PhaseState>,
    armed: bool,
}

impl DrainingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.phase = SyncPhase::Idle;
            state.follow_up_requested = false;
        }
    }
}

/// キューを 1 パスずつリモートへ再送する
pub struct SyncCoordinator {
    queue: Arc<ActionQueue>,
    id_map: Arc<IdMappingTable>,
    remote: Arc<dyn RemoteStore>,
    monitor: Arc<ConnectivityMonitor>,
    config: SyncConfig,
    reconcilers: RwLock<HashMap<CollectionName, Arc<dyn CreateReconciler>>>,
    event_sink: Option<Arc<dyn SyncEventSink>>,
    metrics: DrainMetrics,
    state: Mutex<PhaseState>,
}

impl SyncCoordinator {
    pub fn new(context: &SyncContext, config: SyncConfig) -> Self {
        Self {
            queue: Arc::clone(&context.queue),
            id_map: Arc::clone(&context.id_map),
            remote: Arc::clone(&context.remote),
            monitor: Arc::clone(&context.monitor),
            config,
            reconcilers: RwLock::new(HashMap::new()),
            event_sink: None,
            metrics: DrainMetrics::new(),
            state: Mutex::new(PhaseState {
                phase: SyncPhase::Idle,
                follow_up_requested: false,
                last_report: None,
            }),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn SyncEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn register_reconciler(
        &self,
        collection: CollectionName,
        reconciler: Arc<dyn CreateReconciler>,
    ) {
        self.reconcilers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection, reconciler);
    }

    /// 再接続の監視と起動時の排出を開始する
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let mut online_rx = self.monitor.watch();
        // 起動時点の状態で判定する
        let drain_at_start = self.config.drain_on_start
            && *online_rx.borrow_and_update()
            && !self.queue.is_empty();

        tokio::spawn(async move {
            if drain_at_start {
                coordinator.run_trigger(DrainTrigger::Startup).await;
            }

            if !coordinator.config.auto_sync {
                tracing::info!(
                    target: "sync::coordinator",
                    "automatic sync on reconnect is disabled"
                );
                return;
            }

            while online_rx.changed().await.is_ok() {
                let online = *online_rx.borrow_and_update();
                if !online || coordinator.queue.is_empty() {
                    continue;
                }
                let worker = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    worker.run_trigger(DrainTrigger::Reconnect).await;
                });
            }
        })
    }

    pub async fn sync_now(&self) -> Result<DrainOutcome, AppError> {
        self.trigger(DrainTrigger::Manual).await
    }

    /// 排出を開始する。既に排出中なら後続パスを 1 回だけ予約して戻る。
    pub async fn trigger(&self, trigger: DrainTrigger) -> Result<DrainOutcome, AppError> {
        if !self.monitor.current() {
            tracing::debug!(
                target: "sync::coordinator",
                trigger = %trigger,
                "skipping drain while offline"
            );
            return Ok(DrainOutcome::Completed(Vec::new()));
        }

        {
            let mut state = self.lock_state();
            if state.phase == SyncPhase::Draining {
                state.follow_up_requested = true;
                tracing::debug!(
                    target: "sync::coordinator",
                    trigger = %trigger,
                    "drain already running; follow-up pass scheduled"
                );
                return Ok(DrainOutcome::Coalesced);
            }
            state.phase = SyncPhase::Draining;
        }

        let mut guard = DrainingGuard {
            state: &self.state,
            armed: true,
        };
        let mut reports = Vec::new();
        let mut current = trigger;

        loop {
            let report = self.drain_pass(current).await?;
            reports.push(report.clone());

            let mut state = self.lock_state();
            state.last_report = Some(report);
            if state.follow_up_requested && self.monitor.current() {
                state.follow_up_requested = false;
                current = DrainTrigger::FollowUp;
                continue;
            }
            state.phase = SyncPhase::Idle;
            state.follow_up_requested = false;
            guard.disarm();
            break;
        }

        Ok(DrainOutcome::Completed(reports))
    }

    async fn run_trigger(&self, trigger: DrainTrigger) {
        if let Err(err) = self.trigger(trigger).await {
            tracing::error!(
                target: "sync::coordinator",
                trigger = %trigger,
                error = %err,
                "drain pass failed"
            );
        }
    }

    async fn drain_pass(&self, trigger: DrainTrigger) -> Result<DrainReport, AppError> {
        let started_at = Utc::now();
        let snapshot = self.queue.drain_snapshot().await;
        self.emit_started(trigger, snapshot.len());

        tracing::info!(
            target: "sync::coordinator",
            trigger = %trigger,
            pending = snapshot.len(),
            "drain pass started"
        );

        self.flush_mappings().await;

        let mut succeeded = HashSet::new();
        let mut failures = Vec::new();
        for action in &snapshot {
            match self.replay(action).await {
                Ok(()) => {
                    succeeded.insert(action.id.clone());
                }
                Err(err) => {
                    tracing::warn!(
                        target: "sync::coordinator",
                        action_id = %action.id,
                        kind = %action.kind(),
                        collection = %action.collection,
                        error = %err,
                        "queued action failed; retained for next pass"
                    );
                    failures.push((action.id.clone(), err.to_string()));
                }
            }
        }

        self.flush_mappings().await;
        self.queue.remove(&succeeded).await?;
        if let Err(err) = self.queue.record_failures(&failures).await {
            tracing::warn!(
                target: "sync::coordinator",
                error = %err,
                "failed to record action failures"
            );
        }
        if self.queue.is_empty() {
            self.prune_mappings().await;
        }

        let attempted = snapshot.len() as u32;
        let succeeded_count = succeeded.len() as u32;
        let report = DrainReport {
            trigger,
            attempted,
            succeeded: succeeded_count,
            still_pending: self.queue.pending_count() as u32,
            degraded: attempted > 0 && succeeded_count == 0,
            started_at,
            finished_at: Utc::now(),
        };

        let outcome = self.metrics.record_pass(&DrainPassSample {
            trigger: trigger.as_str().to_string(),
            attempted: report.attempted,
            succeeded: report.succeeded,
            still_pending: report.still_pending,
            duration_ms: report.duration_ms(),
        });

        if report.degraded {
            tracing::warn!(
                target: "sync::coordinator",
                trigger = %trigger,
                attempted = report.attempted,
                "drain pass made no progress; connectivity looks degraded"
            );
        } else {
            tracing::info!(
                target: "sync::coordinator",
                trigger = %trigger,
                succeeded = report.succeeded,
                still_pending = report.still_pending,
                outcome = ?outcome,
                "drain pass completed"
            );
        }

        self.emit_completed(&report);
        Ok(report)
    }

    async fn replay(&self, action: &QueuedAction) -> Result<(), AppError> {
        let collection = &action.collection;
        match &action.payload {
            ActionPayload::Create {
                temp_id,
                partition,
                record,
            } => {
                let created = self
                    .remote
                    .insert(collection, record.without_field(REMOTE_ID_FIELD))
                    .await?;
                if let Some(temp_id) = temp_id {
                    self.reconcile(collection, partition.as_ref(), temp_id, &created)
                        .await;
                }
                Ok(())
            }
            ActionPayload::Update { id, fields } => {
                let id = self.resolve_id(collection, id).await?;
                self.remote
                    .update(collection, &id, fields.without_field(REMOTE_ID_FIELD))
                    .await
            }
            ActionPayload::Delete { id } => {
                let id = self.resolve_id(collection, id).await?;
                self.remote.delete(collection, &id).await
            }
        }
    }

    /// 一時 ID をリモート ID に解決する。作成が未確定ならリモートには送らない。
    async fn resolve_id(
        &self,
        collection: &CollectionName,
        id: &RecordId,
    ) -> Result<RecordId, AppError> {
        self.id_map.resolve(collection, id).await.ok_or_else(|| {
            AppError::ValidationError(format!(
                "Temporary id {id} has not been confirmed by the remote store yet"
            ))
        })
    }

    /// リモート作成後の後処理。失敗してもアクション自体は成功扱いにする。
    async fn reconcile(
        &self,
        collection: &CollectionName,
        partition: Option<&PartitionKey>,
        temp_id: &RecordId,
        created: &Value,
    ) {
        let remote_id = created
            .get(REMOTE_ID_FIELD)
            .cloned()
            .and_then(|raw| serde_json::from_value::<RecordId>(raw).ok());
        let Some(remote_id) = remote_id else {
            tracing::warn!(
                target: "sync::coordinator",
                collection = %collection,
                temp_id = %temp_id,
                "remote insert returned no usable id"
            );
            return;
        };

        if let Err(err) = self.id_map.record(collection, temp_id, &remote_id).await {
            tracing::warn!(
                target: "sync::coordinator",
                temp_id = %temp_id,
                error = %err,
                "failed to persist id mapping; kept in memory for retry"
            );
        }

        let reconciler = self
            .reconcilers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned();
        if let Some(reconciler) = reconciler {
            if let Err(err) = reconciler
                .reconcile_created(partition, temp_id, created)
                .await
            {
                tracing::warn!(
                    target: "sync::coordinator",
                    collection = %collection,
                    temp_id = %temp_id,
                    error = %err,
                    "failed to reconcile cached record"
                );
            }
        }
    }

    async fn flush_mappings(&self) {
        if !self.id_map.needs_flush() {
            return;
        }
        if let Err(err) = self.id_map.flush().await {
            tracing::warn!(
                target: "sync::coordinator",
                error = %err,
                "id mappings are still not persisted"
            );
        }
    }

    async fn prune_mappings(&self) {
        let cutoff = Utc::now() - Duration::hours(ID_MAPPING_RETENTION_HOURS);
        match self.id_map.prune_before(cutoff).await {
            Ok(0) => {}
            Ok(pruned) => tracing::debug!(
                target: "sync::coordinator",
                pruned,
                "pruned settled id mappings"
            ),
            Err(err) => tracing::warn!(
                target: "sync::coordinator",
                error = %err,
                "failed to prune id mappings"
            ),
        }
    }

    fn emit_started(&self, trigger: DrainTrigger, pending: usize) {
        if let Some(sink) = &self.event_sink {
            if let Err(err) = sink.emit_started(trigger, pending) {
                tracing::warn!(
                    target: "sync::coordinator",
                    error = %err,
                    "failed to emit drain started event"
                );
            }
        }
    }

    fn emit_completed(&self, report: &DrainReport) {
        if let Some(sink) = &self.event_sink {
            if let Err(err) = sink.emit_completed(report) {
                tracing::warn!(
                    target: "sync::coordinator",
                    error = %err,
                    "failed to emit drain completed event"
                );
            }
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.lock_state().phase == SyncPhase::Draining
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    pub fn last_report(&self) -> Option<DrainReport> {
        self.lock_state().last_report.clone()
    }

    pub fn status(&self) -> SyncStatusSnapshot {
        let state = self.lock_state();
        SyncStatusSnapshot {
            connectivity: self.monitor.state(),
            is_syncing: state.phase == SyncPhase::Draining,
            pending_count: self.queue.pending_count(),
            last_report: state.last_report.clone(),
        }
    }

    pub fn metrics(&self) -> DrainMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PhaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
