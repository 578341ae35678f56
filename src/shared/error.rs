use thiserror::Error;

/// 同期層全体で利用するエラー型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    /// ローカル永続ストアへの読み書きに失敗した
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// リモートストアに到達できない（オフライン・切り替え中など）
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// リモートストアが操作を明示的に拒否した（バリデーション・認可など）
    #[error("Remote rejected: {0}")]
    RemoteRejected(String),

    /// オフライン時にキャッシュが存在しなかった
    #[error("No cached data available offline: {0}")]
    NoCachedData(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 接続断として扱い、キュー投入へ切り替えるべきエラーか
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::RemoteUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::PersistenceFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            AppError::DeserializationError(err.to_string())
        } else {
            AppError::SerializationError(err.to_string())
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_remote_unavailable_is_transient() {
        assert!(AppError::RemoteUnavailable("timeout".into()).is_transient());
        assert!(!AppError::RemoteRejected("invalid".into()).is_transient());
        assert!(!AppError::PersistenceFailure("disk full".into()).is_transient());
    }

    #[test]
    fn json_syntax_errors_map_to_deserialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            AppError::from(err),
            AppError::DeserializationError(_)
        ));
    }
}
