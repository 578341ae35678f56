/// ホストのトランスポート層から起動時の接続状態を同期的に読む
pub trait ConnectivityProbe: Send + Sync {
    /// 判定できない場合は `None`（オフラインとして扱われる）
    fn initial_online(&self) -> Option<bool>;
}

/// 固定値を返すプローブ（組み込み側で状態を既に知っている場合など）
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub Option<bool>);

impl ConnectivityProbe for StaticProbe {
    fn initial_online(&self) -> Option<bool> {
        self.0
    }
}
