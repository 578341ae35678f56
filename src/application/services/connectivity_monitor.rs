use crate::application::ports::ConnectivityProbe;
use crate::domain::value_objects::{ConnectionQuality, ConnectivityState, TransportSignal};
use crate::shared::config::ConnectivityConfig;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::watch;

type TransitionCallback = Arc<dyn Fn(ConnectivityState) + Send + Sync>;

#[derive(Default)]
struct SubscriberRegistry {
    next_id: u64,
    callbacks: BTreeMap<u64, TransitionCallback>,
}

/// `subscribe` の戻り値。`unsubscribe` を呼ぶまで購読が続く。
pub struct SubscriptionHandle {
    id: u64,
    registry: Weak<Mutex<SubscriberRegistry>>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .remove(&self.id);
        }
    }
}

/// プロセス全体で 1 つのオンライン/オフライン状態を保持し、遷移時に通知する
pub struct ConnectivityMonitor {
    state: RwLock<ConnectivityState>,
    known: AtomicBool,
    online_tx: watch::Sender<bool>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    thresholds: ConnectivityConfig,
}

impl ConnectivityMonitor {
    pub fn new(probe: &dyn ConnectivityProbe, thresholds: ConnectivityConfig) -> Self {
        let initial = probe.initial_online();
        // 判定できない場合はオフライン扱い
        let is_online = initial.unwrap_or(false);
        let (online_tx, _) = watch::channel(is_online);

        tracing::info!(
            target: "sync::connectivity",
            online = is_online,
            known = initial.is_some(),
            "connectivity monitor initialized"
        );

        Self {
            state: RwLock::new(ConnectivityState {
                is_online,
                quality_hint: None,
            }),
            known: AtomicBool::new(initial.is_some()),
            online_tx,
            subscribers: Arc::new(Mutex::new(SubscriberRegistry::default())),
            thresholds,
        }
    }

    pub fn current(&self) -> bool {
        self.read_state().is_online
    }

    pub fn state(&self) -> ConnectivityState {
        self.read_state()
    }

    /// 起動後にシグナルを一度でも受け取ったか（または起動時に判定できたか）
    pub fn is_known(&self) -> bool {
        self.known.load(Ordering::Acquire)
    }

    /// オンライン状態の変化だけを流す watch チャネル
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        let mut registry = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, Arc::new(callback));

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// トランスポート層からのシグナルを反映する。遷移した場合は `true`。
    pub fn report(&self, signal: TransportSignal) -> bool {
        let quality = signal.classify(
            self.thresholds.slow_rtt_ms,
            self.thresholds.slow_downlink_mbps,
        );
        self.apply(signal.online, quality)
    }

    pub fn set_online(&self, online: bool) -> bool {
        let quality = if online {
            self.read_state().quality_hint
        } else {
            None
        };
        self.apply(online, quality)
    }

    fn apply(&self, online: bool, quality: Option<ConnectionQuality>) -> bool {
        self.known.store(true, Ordering::Release);

        let (transitioned, snapshot) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let transitioned = state.is_online != online;
            state.is_online = online;
            state.quality_hint = quality;
            (transitioned, *state)
        };

        if !transitioned {
            return false;
        }

        tracing::info!(
            target: "sync::connectivity",
            online,
            quality = ?quality,
            "connectivity transition"
        );

        self.online_tx.send_replace(online);

        // コールバック内から再度 report されてもデッドロックしないようロック外で呼ぶ
        let callbacks: Vec<TransitionCallback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(snapshot);
        }

        true
    }

    fn read_state(&self) -> ConnectivityState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}
