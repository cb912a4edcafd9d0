//! Errors - エラー型と分類
//!
//! REST 境界で起きる失敗を 4 種類に分類します。
//! どれもプロセスを落とさず、ストア側で「表示用のエラー + retry」に変換されます。

use thiserror::Error;

/// ErrorKind は失敗の運用分類
///
/// - Network: 通信断 / 5xx
/// - Validation: 4xx（リクエスト不正）
/// - NotFound: 消えた ID への操作
/// - StaleState: 別の場所で既に変更された todo への操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Validation,
    NotFound,
    StaleState,
}

impl ErrorKind {
    /// Network failures may succeed unchanged on retry.
    pub fn is_retryable(self) -> bool {
        self == ErrorKind::Network
    }
}

/// MiseError はドメインエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiseError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stale state: {0}")]
    StaleState(String),
}

impl MiseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MiseError::Network(_) => ErrorKind::Network,
            MiseError::Validation(_) => ErrorKind::Validation,
            MiseError::NotFound(_) => ErrorKind::NotFound,
            MiseError::StaleState(_) => ErrorKind::StaleState,
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            MiseError::Network(m)
            | MiseError::Validation(m)
            | MiseError::NotFound(m)
            | MiseError::StaleState(m) => m,
        }
    }

    /// Map an HTTP status to a kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 | 410 => MiseError::NotFound(message),
            409 | 412 => MiseError::StaleState(message),
            400..=499 => MiseError::Validation(message),
            _ => MiseError::Network(message),
        }
    }
}
