use serde::{Deserialize, Serialize};

/// 回線品質のおおまかな分類（表示用のヒントで、排出の可否には影響しない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Slow,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_online: bool,
    pub quality_hint: Option<ConnectionQuality>,
}

impl ConnectivityState {
    pub fn offline() -> Self {
        Self {
            is_online: false,
            quality_hint: None,
        }
    }
}

/// ホストのトランスポート層から届く接続シグナル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSignal {
    pub online: bool,
    /// `slow-2g` / `2g` / `3g` / `4g` などの実効回線種別
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u64>,
}

impl TransportSignal {
    pub fn online() -> Self {
        Self {
            online: true,
            effective_type: None,
            downlink_mbps: None,
            rtt_ms: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::online()
        }
    }

    /// しきい値をもとに品質を分類する。判断材料がなければ `None`。
    pub fn classify(&self, slow_rtt_ms: u64, slow_downlink_mbps: f64) -> Option<ConnectionQuality> {
        if !self.online {
            return None;
        }

        if let Some(kind) = self.effective_type.as_deref() {
            if matches!(kind, "slow-2g" | "2g") {
                return Some(ConnectionQuality::Slow);
            }
        }
        if self.rtt_ms.is_some_and(|rtt| rtt > slow_rtt_ms) {
            return Some(ConnectionQuality::Slow);
        }
        if self
            .downlink_mbps
            .is_some_and(|downlink| downlink < slow_downlink_mbps)
        {
            return Some(ConnectionQuality::Slow);
        }

        if self.effective_type.is_some() || self.rtt_ms.is_some() || self.downlink_mbps.is_some() {
            Some(ConnectionQuality::Fast)
        } else {
            None
        }
    }
}
