//! FeedView - todo feed の表示順
//!
//! # 表示ルール
//! - 未完了: urgency の rank 順（overdue → now → upcoming → later）、同 rank は取得順のまま（stable）
//! - 完了済み: completedAt の新しい順、先頭 N 件だけ表示して残りは件数で示す

use serde::Serialize;

use crate::domain::Todo;

/// One render of the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub active: Vec<Todo>,
    pub recently_completed: Vec<Todo>,
    /// Completed todos hidden behind the preview.
    pub more_completed: usize,
    /// Nothing left to do and at least one thing done.
    pub all_done: bool,
}

impl FeedView {
    pub fn build(todos: &[Todo], preview_limit: usize) -> Self {
        let (mut active, mut completed): (Vec<Todo>, Vec<Todo>) =
            todos.iter().cloned().partition(|t| !t.completed);

        sort_active(&mut active);

        // 新しい順。completedAt が無いものは最後（stable）
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        let more_completed = completed.len().saturating_sub(preview_limit);
        let all_done = active.is_empty() && !completed.is_empty();
        completed.truncate(preview_limit);

        Self {
            active,
            recently_completed: completed,
            more_completed,
            all_done,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.recently_completed.is_empty()
    }
}

/// Stable sort by urgency rank.
pub fn sort_active(todos: &mut [Todo]) {
    todos.sort_by_key(|t| t.urgency.rank());
}
