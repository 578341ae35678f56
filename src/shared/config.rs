use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// オンライン復帰時に自動でキューを排出するか
    pub auto_sync: bool,
    /// 起動時にオンラインかつ前回セッションのアクションが残っていれば排出する
    pub drain_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// これを超える RTT は低速回線とみなす
    pub slow_rtt_ms: u64,
    /// これを下回る下り帯域は低速回線とみなす
    pub slow_downlink_mbps: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_url: default_database_url(),
                max_connections: 1,
            },
            sync: SyncConfig::default(),
            connectivity: ConnectivityConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            drain_on_start: true,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            slow_rtt_ms: 1_000,
            slow_downlink_mbps: 0.5,
        }
    }
}

fn default_database_url() -> String {
    let base = dirs::data_local_dir()
        .map(|dir| dir.join("coach-sync"))
        .unwrap_or_else(|| "./data".into());
    format!("sqlite:{}?mode=rwc", base.join("offline.db").display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("COACH_SYNC_DATABASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.storage.database_url = trimmed.to_string();
            }
        }
        if let Some(value) = std::env::var("COACH_SYNC_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| parse_u32(&v))
        {
            cfg.storage.max_connections = value.max(1);
        }

        // 同期設定
        if let Ok(v) = std::env::var("COACH_SYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Ok(v) = std::env::var("COACH_SYNC_DRAIN_ON_START") {
            cfg.sync.drain_on_start = parse_bool(&v, cfg.sync.drain_on_start);
        }

        // 回線品質の判定しきい値
        if let Some(value) = std::env::var("COACH_SYNC_SLOW_RTT_MS")
            .ok()
            .and_then(|v| parse_u64(&v))
        {
            cfg.connectivity.slow_rtt_ms = value;
        }
        if let Some(value) = std::env::var("COACH_SYNC_SLOW_DOWNLINK_MBPS")
            .ok()
            .and_then(|v| parse_f64(&v))
        {
            cfg.connectivity.slow_downlink_mbps = value.max(0.0);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage.database_url.trim().is_empty() {
            return Err("Storage database_url must not be empty".to_string());
        }
        if self.storage.max_connections == 0 {
            return Err("Storage max_connections must be greater than 0".to_string());
        }
        if self.connectivity.slow_rtt_ms == 0 {
            return Err("Connectivity slow_rtt_ms must be greater than 0".to_string());
        }
        if !self.connectivity.slow_downlink_mbps.is_finite() {
            return Err("Connectivity slow_downlink_mbps must be a finite number".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}
