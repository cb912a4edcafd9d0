//! MealPlanner - 計画層（weekly meals）の読み取りキャッシュ
//!
//! 実行層からは読むだけ。step の紐づけ後に StepBridge が結果を書き戻し、refetch します。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{MealStep, MealStepId, MealWithDetails, MiseError, WeeklyMealsResponse, WeeklySummary};
use crate::ports::{Clock, MealApi};

#[derive(Debug, Default)]
struct PlannerState {
    weekly: WeeklyMealsResponse,
    error: Option<MiseError>,
    last_fetched: Option<DateTime<Utc>>,
    issued_seq: u64,
    applied_seq: u64,
    /// `issued_seq` when a link was last recorded locally.
    link_floor: u64,
}

struct Inner {
    api: Arc<dyn MealApi>,
    clock: Arc<dyn Clock>,
    state: Mutex<PlannerState>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct MealPlanner {
    inner: Arc<Inner>,
}

impl MealPlanner {
    pub fn new(api: Arc<dyn MealApi>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                clock,
                state: Mutex::new(PlannerState::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Reload the week. Same stale-response rule as the todo store.
    pub async fn fetch_weekly_meals(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        let seq = {
            let mut state = self.inner.state.lock().await;
            state.issued_seq += 1;
            state.error = None;
            state.issued_seq
        };

        let result = self.inner.api.weekly_meals().await;

        if self.is_closed() {
            return false;
        }
        let mut state = self.inner.state.lock().await;
        if seq < state.applied_seq || seq <= state.link_floor {
            debug!(seq, applied = state.applied_seq, "discarding stale weekly meals");
            return false;
        }
        match result {
            Ok(weekly) => {
                info!(
                    seq,
                    meals = weekly.meals.len(),
                    overdue_steps = weekly.summary.overdue_steps,
                    "weekly meals refreshed"
                );
                state.applied_seq = seq;
                state.weekly = weekly;
                state.last_fetched = Some(self.inner.clock.now());
                true
            }
            Err(err) => {
                warn!(seq, error = %err, "failed to fetch weekly meals");
                state.error = Some(err);
                false
            }
        }
    }

    pub async fn meals(&self) -> Vec<MealWithDetails> {
        self.inner.state.lock().await.weekly.meals.clone()
    }

    pub async fn summary(&self) -> WeeklySummary {
        self.inner.state.lock().await.weekly.summary
    }

    /// The step and the name of the meal it belongs to.
    pub async fn find_step(&self, step_id: &MealStepId) -> Option<(String, MealStep)> {
        let state = self.inner.state.lock().await;
        state
            .weekly
            .find_step(step_id)
            .map(|(meal, step)| (meal.meal_name.clone(), step.clone()))
    }

    /// Overwrite the cached copy of a step the server just linked.
    ///
    /// Fetches issued before this call are discarded, so the link survives
    /// until a newer week arrives even if the follow-up refetch fails.
    pub(crate) async fn record_step(&self, linked: MealStep) {
        let mut state = self.inner.state.lock().await;
        state.link_floor = state.issued_seq;
        let cached = state
            .weekly
            .meals
            .iter_mut()
            .flat_map(|meal| meal.steps.iter_mut())
            .find(|s| s.id == linked.id);
        match cached {
            Some(step) => *step = linked,
            None => debug!(step_id = %linked.id, "linked step not in cached week"),
        }
    }

    /// Steps not yet done and not yet on the todo list.
    pub async fn schedulable_steps(&self) -> Vec<(String, MealStep)> {
        let state = self.inner.state.lock().await;
        state
            .weekly
            .meals
            .iter()
            .flat_map(|meal| {
                meal.steps
                    .iter()
                    .filter(|s| !s.is_step_completed && !s.is_bridged())
                    .map(|s| (meal.meal_name.clone(), s.clone()))
            })
            .collect()
    }

    pub async fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().await.last_fetched
    }

    pub async fn error(&self) -> Option<MiseError> {
        self.inner.state.lock().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.inner.state.lock().await.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{ApiCall, InMemoryApi};
    use crate::ports::SystemClock;

    fn setup() -> (Arc<InMemoryApi>, MealPlanner) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let api = Arc::new(InMemoryApi::new(clock.clone()));
        let mut linked = MealStep::new("step-2", "meal-1", 2, "Chop onions");
        linked.todo_id = Some("todo-1".into());
        api.seed_meals(vec![
            MealWithDetails::new("meal-1", "Sunday Dinner")
                .with_step(MealStep::new("step-1", "meal-1", 1, "Preheat oven"))
                .with_step(linked),
        ]);
        let planner = MealPlanner::new(api.clone(), clock);
        (api, planner)
    }

    #[tokio::test]
    async fn fetch_then_lookup_step() {
        let (_api, planner) = setup();
        assert!(planner.fetch_weekly_meals().await);

        let (meal_name, step) = planner.find_step(&"step-1".into()).await.unwrap();
        assert_eq!(meal_name, "Sunday Dinner");
        assert_eq!(step.instruction, "Preheat oven");
        assert_eq!(planner.summary().await.total_meals, 1);
        assert!(planner.last_fetched().await.is_some());
    }

    #[tokio::test]
    async fn bridged_steps_are_not_schedulable() {
        let (_api, planner) = setup();
        planner.fetch_weekly_meals().await;

        let steps = planner.schedulable_steps().await;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].1.id.as_str(), "step-1");
    }

    #[tokio::test]
    async fn recorded_link_survives_failed_refetch() {
        let (api, planner) = setup();
        planner.fetch_weekly_meals().await;

        let mut linked = MealStep::new("step-1", "meal-1", 1, "Preheat oven");
        linked.todo_id = Some("todo-9".into());
        planner.record_step(linked).await;

        api.fail_next(ApiCall::WeeklyMeals, MiseError::Network("down".into()));
        planner.fetch_weekly_meals().await;

        let (_, step) = planner.find_step(&"step-1".into()).await.unwrap();
        assert_eq!(step.todo_id.as_ref().map(|id| id.as_str()), Some("todo-9"));
        assert!(planner.schedulable_steps().await.is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_previous_week_and_records_error() {
        let (api, planner) = setup();
        planner.fetch_weekly_meals().await;

        api.fail_next(ApiCall::WeeklyMeals, MiseError::Network("down".into()));
        assert!(!planner.fetch_weekly_meals().await);
        assert_eq!(planner.meals().await.len(), 1);
        assert!(planner.error().await.is_some());

        planner.clear_error().await;
        assert!(planner.error().await.is_none());
    }
}
