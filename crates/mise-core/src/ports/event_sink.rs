//! EventSink port - 通知イベントの出口
//!
//! UI では toast、CLI では標準出力、テストでは記録用の Vec に流れます。

use async_trait::async_trait;

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを受け取る
///
/// 通知は fire-and-forget: sink の失敗は呼び出し側に返さない。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DomainEvent);
}
