//! Meal model (planning tier), consumed read-only by the execution tier.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MealId, MealStepId, TodoId};

/// One cooking step of a planned meal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealStep {
    pub id: MealStepId,
    pub meal_id: MealId,
    pub instruction: String,
    #[serde(default)]
    pub step_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_minutes: Option<u32>,
    #[serde(default)]
    pub is_step_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_date: Option<NaiveDate>,
    /// Backlink once the step has been bridged into a todo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_id: Option<TodoId>,
}

impl MealStep {
    pub fn new(
        id: impl Into<MealStepId>,
        meal_id: impl Into<MealId>,
        step_number: u32,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            meal_id: meal_id.into(),
            instruction: instruction.into(),
            step_number,
            estimated_duration_minutes: None,
            is_step_completed: false,
            assigned_to_date: None,
            todo_id: None,
        }
    }

    pub fn is_bridged(&self) -> bool {
        self.todo_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealWithDetails {
    pub id: MealId,
    pub meal_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_to_be_eaten_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_meal_been_consumed: bool,
    #[serde(default)]
    pub steps: Vec<MealStep>,
}

impl MealWithDetails {
    pub fn new(id: impl Into<MealId>, meal_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meal_name: meal_name.into(),
            scheduled_to_be_eaten_at: None,
            has_meal_been_consumed: false,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: MealStep) -> Self {
        self.steps.push(step);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub total_meals: u32,
    pub completed_meals: u32,
    pub upcoming_meals: u32,
    pub overdue_steps: u32,
}

/// `GET /api/meals/weekly`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyMealsResponse {
    pub meals: Vec<MealWithDetails>,
    pub summary: WeeklySummary,
}

impl WeeklyMealsResponse {
    pub fn find_step(&self, step_id: &MealStepId) -> Option<(&MealWithDetails, &MealStep)> {
        self.meals.iter().find_map(|meal| {
            meal.steps
                .iter()
                .find(|s| &s.id == step_id)
                .map(|step| (meal, step))
        })
    }
}

/// `PUT /api/meals/steps/{id}`: record which todo a step became.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLink {
    pub todo_id: TodoId,
    pub assigned_to_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_from_wire_without_backlink() {
        let step: MealStep = serde_json::from_value(json!({
            "id": "step-2",
            "mealId": "meal-1",
            "instruction": "Season chicken with salt and pepper",
            "stepNumber": 2,
            "estimatedDurationMinutes": 5,
            "isStepCompleted": false,
            "assignedToDate": null,
            "todoId": null,
        }))
        .unwrap();

        assert!(!step.is_bridged());
        assert_eq!(step.estimated_duration_minutes, Some(5));
    }

    #[test]
    fn find_step_returns_owning_meal() {
        let weekly = WeeklyMealsResponse {
            meals: vec![
                MealWithDetails::new("meal-1", "Sunday Dinner")
                    .with_step(MealStep::new("step-1", "meal-1", 1, "Preheat grill")),
            ],
            summary: WeeklySummary::default(),
        };

        let (meal, step) = weekly.find_step(&MealStepId::new("step-1")).unwrap();
        assert_eq!(meal.meal_name, "Sunday Dinner");
        assert_eq!(step.instruction, "Preheat grill");
        assert!(weekly.find_step(&MealStepId::new("nope")).is_none());
    }
}
