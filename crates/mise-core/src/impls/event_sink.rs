//! EventSink 実装
//!
//! - **TracingEventSink**: 通知を tracing のログに流す（デフォルト）
//! - **RecordingEventSink**: 受け取ったイベントを保持する（テスト用）

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{DomainEvent, NoticeLevel};
use crate::ports::EventSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: DomainEvent) {
        let notice = event.notice();
        match notice.level {
            NoticeLevel::Success => {
                info!(title = %notice.title, description = %notice.description, "notice")
            }
            NoticeLevel::Error => {
                warn!(title = %notice.title, description = %notice.description, "notice")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: DomainEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, Notice};

    #[tokio::test]
    async fn recording_sink_keeps_order_and_drains() {
        let sink = RecordingEventSink::new();
        for title in ["first", "second"] {
            sink.emit(DomainEvent::StepScheduleFailed {
                step_id: "step-1".into(),
                kind: ErrorKind::Network,
                notice: Notice::error(title, ""),
            })
            .await;
        }

        let titles: Vec<String> = sink
            .events()
            .await
            .iter()
            .map(|e| e.notice().title.clone())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);

        assert_eq!(sink.take().await.len(), 2);
        assert!(sink.events().await.is_empty());
    }
}
