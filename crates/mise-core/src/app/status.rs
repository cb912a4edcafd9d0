//! Status - 進捗サマリー
//!
//! feed の横に出す「今日の進み具合」。todos と counts から毎回計算する。

use serde::Serialize;

use crate::domain::{Todo, TodoContext, TodoCounts};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub completion_percentage: f64,
    /// Open todos in the `now` or `overdue` tier.
    pub urgent_count: usize,
    pub meal_todos_total: usize,
    pub meal_todos_completed: usize,
    pub standalone_completed: usize,
    pub can_start_now: usize,
    pub overdue: u32,
}

impl ProgressSummary {
    pub fn compute(todos: &[Todo], counts: &TodoCounts) -> Self {
        let completion_percentage = if counts.total > 0 {
            f64::from(counts.completed) / f64::from(counts.total) * 100.0
        } else {
            0.0
        };

        let open = || todos.iter().filter(|t| !t.completed);
        let meal = || todos.iter().filter(|t| t.context.is_meal());

        Self {
            completion_percentage,
            urgent_count: open().filter(|t| t.urgency.is_urgent()).count(),
            meal_todos_total: meal().count(),
            meal_todos_completed: meal().filter(|t| t.completed).count(),
            standalone_completed: todos
                .iter()
                .filter(|t| t.completed && t.context == TodoContext::Standalone)
                .count(),
            can_start_now: open().filter(|t| t.can_start_now).count(),
            overdue: counts.overdue,
        }
    }

    /// One-line encouragement shown under the progress bar.
    pub fn message(&self) -> String {
        let pct = self.completion_percentage;
        if self.overdue > 0 {
            let plural = if self.overdue > 1 { "s" } else { "" };
            format!("{} task{plural} need immediate attention", self.overdue)
        } else if pct >= 100.0 {
            "All tasks completed! You're crushing it!".to_string()
        } else if pct >= 75.0 {
            "Almost there! Keep up the great work".to_string()
        } else if pct >= 50.0 {
            "Good progress! You're halfway done".to_string()
        } else if pct >= 25.0 {
            "Getting started! Every task counts".to_string()
        } else {
            "Ready to tackle the day? Let's begin!".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Urgency;
    use chrono::Utc;

    fn meal_ctx() -> TodoContext {
        TodoContext::Meal {
            meal_name: "Sunday Dinner".to_string(),
            step_number: Some(1),
            estimated_duration: None,
        }
    }

    #[test]
    fn metrics_split_by_context_and_urgency() {
        let mut urgent = Todo::new("a", "a").with_context(meal_ctx());
        urgent.urgency = Urgency::Now;
        let startable = Todo::new("b", "b").startable();
        let meal_done = Todo::new("c", "c")
            .with_context(meal_ctx())
            .completed_at(Utc::now());
        let solo_done = Todo::new("d", "d").completed_at(Utc::now());

        let todos = vec![urgent, startable, meal_done, solo_done];
        let counts = TodoCounts::tally(&todos);
        let summary = ProgressSummary::compute(&todos, &counts);

        assert_eq!(summary.completion_percentage, 50.0);
        assert_eq!(summary.urgent_count, 1);
        assert_eq!(summary.meal_todos_total, 2);
        assert_eq!(summary.meal_todos_completed, 1);
        assert_eq!(summary.standalone_completed, 1);
        assert_eq!(summary.can_start_now, 1);
        assert_eq!(summary.message(), "Good progress! You're halfway done");
    }

    #[test]
    fn overdue_message_wins() {
        let counts = TodoCounts {
            total: 4,
            completed: 4,
            remaining: 0,
            overdue: 2,
        };
        let summary = ProgressSummary::compute(&[], &counts);
        assert_eq!(summary.message(), "2 tasks need immediate attention");
    }

    #[test]
    fn empty_day_is_zero_percent() {
        let summary = ProgressSummary::compute(&[], &TodoCounts::default());
        assert_eq!(summary.completion_percentage, 0.0);
        assert_eq!(summary.message(), "Ready to tackle the day? Let's begin!");
    }
}
