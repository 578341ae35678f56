use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const UNSET_TS: u64 = 0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcomeStatus {
    /// 全件成功
    Clean,
    /// 一部が未同期のまま残った
    Partial,
    /// 1件も成功しなかった（回線劣化とみなす）
    Degraded,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DrainMetricsSnapshot {
    pub total_passes: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub degraded_passes: u64,
    pub consecutive_degraded: u64,
    pub last_pass_ms: Option<u64>,
    pub last_degraded_ms: Option<u64>,
    pub last_outcome: Option<DrainOutcomeStatus>,
    pub last_trigger: Option<String>,
    pub last_attempted: Option<u32>,
    pub last_succeeded: Option<u32>,
    pub last_still_pending: Option<u32>,
    pub last_duration_ms: Option<u64>,
}

#[derive(Default, Clone)]
struct LastPassMetadata {
    outcome: Option<DrainOutcomeStatus>,
    trigger: Option<String>,
    attempted: Option<u32>,
    succeeded: Option<u32>,
    still_pending: Option<u32>,
    duration_ms: Option<u64>,
}

/// 排出パスごとの集計値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainPassSample {
    pub trigger: String,
    pub attempted: u32,
    pub succeeded: u32,
    pub still_pending: u32,
    pub duration_ms: u64,
}

/// キュー排出の結果を集計するメトリクス
pub struct DrainMetrics {
    passes: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    degraded: AtomicU64,
    consecutive_degraded: AtomicU64,
    last_pass_ms: AtomicU64,
    last_degraded_ms: AtomicU64,
    metadata: Mutex<LastPassMetadata>,
}

impl DrainMetrics {
    pub fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            degraded: AtomicU64::new(0),
            consecutive_degraded: AtomicU64::new(0),
            last_pass_ms: AtomicU64::new(UNSET_TS),
            last_degraded_ms: AtomicU64::new(UNSET_TS),
            metadata: Mutex::new(LastPassMetadata::default()),
        }
    }

    pub fn record_pass(&self, sample: &DrainPassSample) -> DrainOutcomeStatus {
        let now = current_unix_ms();
        let failed = sample.attempted.saturating_sub(sample.succeeded);
        let outcome = classify(sample);

        self.passes.fetch_add(1, Ordering::Relaxed);
        self.succeeded
            .fetch_add(u64::from(sample.succeeded), Ordering::Relaxed);
        self.failed.fetch_add(u64::from(failed), Ordering::Relaxed);
        self.last_pass_ms.store(now, Ordering::Relaxed);

        match outcome {
            DrainOutcomeStatus::Degraded => {
                self.degraded.fetch_add(1, Ordering::Relaxed);
                self.consecutive_degraded.fetch_add(1, Ordering::Relaxed);
                self.last_degraded_ms.store(now, Ordering::Relaxed);
            }
            DrainOutcomeStatus::Clean | DrainOutcomeStatus::Partial => {
                self.consecutive_degraded.store(0, Ordering::Relaxed);
            }
        }

        if let Ok(mut guard) = self.metadata.lock() {
            guard.outcome = Some(outcome);
            guard.trigger = Some(sample.trigger.clone());
            guard.attempted = Some(sample.attempted);
            guard.succeeded = Some(sample.succeeded);
            guard.still_pending = Some(sample.still_pending);
            guard.duration_ms = Some(sample.duration_ms);
        }

        outcome
    }

    pub fn snapshot(&self) -> DrainMetricsSnapshot {
        let metadata = self
            .metadata
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        DrainMetricsSnapshot {
            total_passes: self.passes.load(Ordering::Relaxed),
            total_succeeded: self.succeeded.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            degraded_passes: self.degraded.load(Ordering::Relaxed),
            consecutive_degraded: self.consecutive_degraded.load(Ordering::Relaxed),
            last_pass_ms: timestamp_to_option(self.last_pass_ms.load(Ordering::Relaxed)),
            last_degraded_ms: timestamp_to_option(self.last_degraded_ms.load(Ordering::Relaxed)),
            last_outcome: metadata.outcome,
            last_trigger: metadata.trigger,
            last_attempted: metadata.attempted,
            last_succeeded: metadata.succeeded,
            last_still_pending: metadata.still_pending,
            last_duration_ms: metadata.duration_ms,
        }
    }
}

impl Default for DrainMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(sample: &DrainPassSample) -> DrainOutcomeStatus {
    if sample.attempted > 0 && sample.succeeded == 0 {
        DrainOutcomeStatus::Degraded
    } else if sample.still_pending > 0 {
        DrainOutcomeStatus::Partial
    } else {
        DrainOutcomeStatus::Clean
    }
}

#[inline]
pub fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(UNSET_TS)
}

#[inline]
pub fn timestamp_to_option(value: u64) -> Option<u64> {
    if value == UNSET_TS {
        None
    } else {
        Some(value)
    }
}
