use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 排出パスを開始したきっかけ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainTrigger {
    Reconnect,
    Manual,
    Startup,
    /// 排出中に届いたトリガーによる追加パス
    FollowUp,
}

impl DrainTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainTrigger::Reconnect => "reconnect",
            DrainTrigger::Manual => "manual",
            DrainTrigger::Startup => "startup",
            DrainTrigger::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrainReport {
    pub trigger: DrainTrigger,
    pub attempted: u32,
    pub succeeded: u32,
    pub still_pending: u32,
    /// 未処理があったのに 1 件も成功しなかった
    pub degraded: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DrainReport {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// `trigger` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// このトリガーで排出を実行した（後続パスを含む）
    Completed(Vec<DrainReport>),
    /// 既に排出中だったため後続パスの予約だけ行った
    Coalesced,
}

impl DrainOutcome {
    pub fn reports(&self) -> &[DrainReport] {
        match self {
            DrainOutcome::Completed(reports) => reports,
            DrainOutcome::Coalesced => &[],
        }
    }
}
