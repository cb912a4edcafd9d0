//! TodoCounts - 集計スナップショット
//!
//! サーバが `GET /api/todos/today` で返す集計値を保持し、
//! 楽観的更新の間は差分（delta）で追従させます。
//!
//! # 不変条件
//! - settled（保留中の楽観的更新がない）状態では `completed + remaining == total`

use serde::{Deserialize, Serialize};

use super::todo::Todo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoCounts {
    pub total: u32,
    pub completed: u32,
    pub remaining: u32,
    pub overdue: u32,
}

impl TodoCounts {
    /// Recount from a todo list (uses the derived `is_overdue` flag).
    pub fn tally(todos: &[Todo]) -> Self {
        let mut counts = Self::default();
        for todo in todos {
            counts.total += 1;
            if todo.completed {
                counts.completed += 1;
            } else {
                counts.remaining += 1;
            }
            if todo.is_overdue {
                counts.overdue += 1;
            }
        }
        counts
    }

    pub fn is_consistent(&self) -> bool {
        self.completed + self.remaining == self.total
    }

    /// A todo moved from open to completed.
    pub fn record_completion(&mut self, was_overdue: bool) {
        self.completed += 1;
        self.remaining = self.remaining.saturating_sub(1);
        if was_overdue {
            self.overdue = self.overdue.saturating_sub(1);
        }
    }

    /// Inverse of `record_completion`.
    pub fn undo_completion(&mut self, was_overdue: bool) {
        self.completed = self.completed.saturating_sub(1);
        self.remaining += 1;
        if was_overdue {
            self.overdue += 1;
        }
    }

    /// A todo left the list.
    pub fn record_removal(&mut self, was_completed: bool, was_overdue: bool) {
        self.total = self.total.saturating_sub(1);
        if was_completed {
            self.completed = self.completed.saturating_sub(1);
        } else {
            self.remaining = self.remaining.saturating_sub(1);
        }
        if was_overdue {
            self.overdue = self.overdue.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: u32, completed: u32, remaining: u32, overdue: u32) -> TodoCounts {
        TodoCounts {
            total,
            completed,
            remaining,
            overdue,
        }
    }

    #[test]
    fn completion_and_undo_are_inverse() {
        let before = counts(4, 1, 3, 2);
        let mut c = before;
        c.record_completion(true);
        assert_eq!(c, counts(4, 2, 2, 1));
        assert!(c.is_consistent());

        c.undo_completion(true);
        assert_eq!(c, before);
    }

    #[test]
    fn removing_completed_leaves_remaining() {
        let mut c = counts(3, 1, 2, 0);
        c.record_removal(true, false);
        assert_eq!(c, counts(2, 0, 2, 0));
    }

    #[test]
    fn removing_open_overdue_todo() {
        let mut c = counts(3, 1, 2, 1);
        c.record_removal(false, true);
        assert_eq!(c, counts(2, 1, 1, 0));
    }

    #[test]
    fn deltas_never_underflow() {
        let mut c = TodoCounts::default();
        c.record_removal(false, true);
        c.undo_completion(false);
        assert_eq!(c.total, 0);
        assert_eq!(c.overdue, 0);
    }

    #[test]
    fn tally_counts_every_bucket() {
        let mut overdue = Todo::new("a", "a");
        overdue.is_overdue = true;
        let done = Todo::new("b", "b").completed_at(chrono::Utc::now());
        let open = Todo::new("c", "c");

        let c = TodoCounts::tally(&[overdue, done, open]);
        assert_eq!(c, counts(3, 1, 2, 1));
    }
}
