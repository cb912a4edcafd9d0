//! Todo model: the unit of actionable work in the execution tier.
//!
//! Wire shape follows the REST service (camelCase JSON). Derived fields
//! (`urgency`, `isOverdue`) are accepted when present but the store always
//! recomputes them with its own clock and `UrgencyPolicy`.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::counts::TodoCounts;
use super::ids::{MealId, MealStepId, TodoId};
use super::urgency::Urgency;

/// When a todo is meant to happen.
///
/// The service sends either a bare calendar day (`"2025-03-02"`) or a full
/// RFC 3339 instant. Both are kept as-is: a day-only todo is actionable for
/// the whole local day, a timed todo has a start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schedule {
    At(DateTime<Utc>),
    Day(NaiveDate),
}

impl Schedule {
    /// Local calendar day this schedule falls on.
    pub fn local_date(&self, offset: FixedOffset) -> NaiveDate {
        match self {
            Schedule::At(at) => at.with_timezone(&offset).date_naive(),
            Schedule::Day(day) => *day,
        }
    }
}

/// Link from a todo back to the planning tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealInstructionRef {
    pub meal_step_id: MealStepId,
    pub meal_id: MealId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
    pub step_number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRelation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_instruction: Option<MealInstructionRef>,
}

/// Where a todo came from.
///
/// Serialized as `{"type": "meal", ...}` / `{"type": "standalone"}`.
/// A todo without context is standalone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TodoContext {
    Meal {
        #[serde(rename = "mealName", default)]
        meal_name: String,
        #[serde(rename = "stepNumber", default, skip_serializing_if = "Option::is_none")]
        step_number: Option<u32>,
        /// Minutes.
        #[serde(
            rename = "estimatedDuration",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        estimated_duration: Option<u32>,
    },
    #[default]
    Standalone,
}

impl TodoContext {
    pub fn is_meal(&self) -> bool {
        matches!(self, TodoContext::Meal { .. })
    }
}

/// A todo as held by the client cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<TodoRelation>,
    #[serde(default)]
    pub context: TodoContext,
    /// Server-side signal: no blocking prerequisite, may be done whenever.
    #[serde(default)]
    pub can_start_now: bool,

    // --- derived, recomputed by the store ---
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub is_overdue: bool,
}

impl Todo {
    /// Create an open, unscheduled, standalone todo.
    pub fn new(id: impl Into<TodoId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            completed: false,
            scheduled_for: None,
            completed_at: None,
            created_at: None,
            relations: Vec::new(),
            context: TodoContext::Standalone,
            can_start_now: false,
            urgency: Urgency::Later,
            is_overdue: false,
        }
    }

    pub fn scheduled(mut self, schedule: Schedule) -> Self {
        self.scheduled_for = Some(schedule);
        self
    }

    pub fn with_context(mut self, context: TodoContext) -> Self {
        self.context = context;
        self
    }

    pub fn startable(mut self) -> Self {
        self.can_start_now = true;
        self
    }

    /// Mark as completed at `at`. A completed todo is never overdue.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at);
        self.is_overdue = false;
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.complete(at);
        self
    }

    /// The meal step this todo was bridged from, if any.
    pub fn meal_step(&self) -> Option<&MealStepId> {
        self.relations
            .iter()
            .find_map(|r| r.meal_instruction.as_ref())
            .map(|m| &m.meal_step_id)
    }
}

/// `GET /api/todos/today`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodayTodosResponse {
    pub todos: Vec<Todo>,
    pub counts: TodoCounts,
}

/// `POST /api/todos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<TodoRelation>,
}

/// `PUT /api/todos/{id}` (partial update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub id: TodoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl UpdateTodoRequest {
    pub fn completion(id: TodoId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            description: None,
            completed: Some(true),
            scheduled_for: None,
            completed_at: Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn schedule_accepts_day_and_instant() {
        let day: Schedule = serde_json::from_value(json!("2025-03-02")).unwrap();
        assert_eq!(
            day,
            Schedule::Day(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap())
        );

        let at: Schedule = serde_json::from_value(json!("2025-03-02T18:30:00Z")).unwrap();
        assert_eq!(
            at,
            Schedule::At(Utc.with_ymd_and_hms(2025, 3, 2, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn minimal_todo_defaults_to_standalone() {
        let todo: Todo = serde_json::from_value(json!({
            "id": "todo-1",
            "description": "Buy milk",
        }))
        .unwrap();

        assert!(!todo.completed);
        assert_eq!(todo.context, TodoContext::Standalone);
        assert_eq!(todo.urgency, Urgency::Later);
    }

    #[test]
    fn meal_context_is_tagged() {
        let todo: Todo = serde_json::from_value(json!({
            "id": "todo-1",
            "description": "Sunday Dinner: Season chicken",
            "context": {"type": "meal", "mealName": "Sunday Dinner", "stepNumber": 2, "estimatedDuration": 5},
        }))
        .unwrap();

        assert_eq!(
            todo.context,
            TodoContext::Meal {
                meal_name: "Sunday Dinner".to_string(),
                step_number: Some(2),
                estimated_duration: Some(5),
            }
        );

        let v = serde_json::to_value(&TodoContext::Standalone).unwrap();
        assert_eq!(v, json!({"type": "standalone"}));
    }

    #[test]
    fn completing_clears_overdue_and_stamps_time() {
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        let mut todo = Todo::new("t1", "x");
        todo.is_overdue = true;

        todo.complete(at);

        assert!(todo.completed);
        assert_eq!(todo.completed_at, Some(at));
        assert!(!todo.is_overdue);
    }

    #[test]
    fn completion_request_omits_untouched_fields() {
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        let req = UpdateTodoRequest::completion(TodoId::new("t1"), at);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({"id": "t1", "completed": true, "completedAt": "2025-03-02T09:00:00Z"})
        );
    }
}
