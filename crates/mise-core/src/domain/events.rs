//! Events - ドメインイベント
//!
//! EventSink に流すイベント。UI 側はこれを toast 通知として表示します。

use chrono::NaiveDate;

use super::errors::ErrorKind;
use super::ids::{MealStepId, TodoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// ユーザーに見せる通知（タイトル + 説明）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// DomainEvent はドメインで発生したイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// meal step が todo に変換された
    StepScheduled {
        step_id: MealStepId,
        todo_id: TodoId,
        date: NaiveDate,
        notice: Notice,
    },
    /// meal step の変換に失敗した（step は未変換のまま）
    StepScheduleFailed {
        step_id: MealStepId,
        kind: ErrorKind,
        notice: Notice,
    },
}

impl DomainEvent {
    pub fn notice(&self) -> &Notice {
        match self {
            DomainEvent::StepScheduled { notice, .. }
            | DomainEvent::StepScheduleFailed { notice, .. } => notice,
        }
    }
}
