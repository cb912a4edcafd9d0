//! StepBridge - meal step を todo に変換する（計画層 → 実行層）
//!
//! # フロー
//! 1. todo を作成（`relations.mealInstruction` で step を指す）
//! 2. step に todo を紐づける（`PUT /api/meals/steps/{id}`）
//! 3. 紐づいた step を planner に書き戻し、todo store と planner を両方 refetch
//! 4. 通知を EventSink に流す
//!
//! # 補償
//! - 2 が失敗したら 1 で作った todo を削除する（孤立 todo を残さない）
//!
//! # at-most-once
//! - 既に todo を持つ step、または変換中の step はもう一度変換しない（StaleState）

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::app::planner::MealPlanner;
use crate::app::store::TodoStore;
use crate::domain::{
    CreateTodoRequest, DomainEvent, MealInstructionRef, MealStep, MealStepId, MiseError, Notice,
    Schedule, StepLink, Todo, TodoRelation, UrgencyPolicy,
};
use crate::ports::{Clock, EventSink, MealApi, TodoApi};

const SUCCESS_TITLE: &str = "Cooking step added to your todo list!";
const FAILURE_TITLE: &str = "Failed to add cooking step to todo list";
const FAILURE_HINT: &str = "Please try again or add the task manually";

/// A meal step picked up from the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDrag {
    pub meal_name: String,
    pub step: MealStep,
}

impl StepDrag {
    pub fn new(meal_name: impl Into<String>, step: MealStep) -> Self {
        Self {
            meal_name: meal_name.into(),
            step,
        }
    }
}

/// Where the step was dropped. No date means today.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropTarget {
    pub date: Option<NaiveDate>,
    pub date_label: Option<String>,
}

impl DropTarget {
    pub fn today() -> Self {
        Self::default()
    }

    pub fn on(date: NaiveDate, label: impl Into<String>) -> Self {
        Self {
            date: Some(date),
            date_label: Some(label.into()),
        }
    }
}

/// Removes the step from the in-flight set when dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<MealStepId>>,
    step_id: MealStepId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.step_id);
    }
}

#[derive(Clone)]
pub struct StepBridge {
    todos: TodoStore,
    planner: MealPlanner,
    todo_api: Arc<dyn TodoApi>,
    meal_api: Arc<dyn MealApi>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    policy: UrgencyPolicy,
    in_flight: Arc<Mutex<HashSet<MealStepId>>>,
}

impl StepBridge {
    pub fn new(
        todos: TodoStore,
        planner: MealPlanner,
        todo_api: Arc<dyn TodoApi>,
        meal_api: Arc<dyn MealApi>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let policy = todos.settings().policy.clone();
        Self {
            todos,
            planner,
            todo_api,
            meal_api,
            clock,
            sink,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Turn a meal step into a todo scheduled on the drop target's day.
    pub async fn schedule_step(&self, drag: StepDrag, target: DropTarget) -> Result<Todo, MiseError> {
        let step_id = drag.step.id.clone();

        let already = match &drag.step.todo_id {
            Some(todo_id) => Some(todo_id.clone()),
            None => self
                .planner
                .find_step(&step_id)
                .await
                .and_then(|(_, step)| step.todo_id),
        };
        if let Some(todo_id) = already {
            let err = MiseError::StaleState(format!(
                "meal step {step_id} is already scheduled as todo {todo_id}"
            ));
            self.report_failure(&step_id, &err).await;
            return Err(err);
        }

        let Some(_guard) = self.claim(&step_id) else {
            let err = MiseError::StaleState(format!("meal step {step_id} is already being scheduled"));
            self.report_failure(&step_id, &err).await;
            return Err(err);
        };

        let today = self.policy.today(self.clock.now());
        let date = target.date.unwrap_or(today);
        debug!(step_id = %step_id, %date, "scheduling meal step");

        match self.bridge(&drag, date).await {
            Ok((todo, linked)) => {
                self.planner.record_step(linked).await;
                tokio::join!(self.todos.fetch_todos(), self.planner.fetch_weekly_meals());

                let label = target.date_label.clone().unwrap_or_else(|| {
                    if date == today {
                        "today".to_string()
                    } else {
                        date.format("%a %b %-d").to_string()
                    }
                });
                info!(step_id = %step_id, todo_id = %todo.id, %date, "meal step scheduled");
                self.sink
                    .emit(DomainEvent::StepScheduled {
                        step_id,
                        todo_id: todo.id.clone(),
                        date,
                        notice: Notice::success(
                            SUCCESS_TITLE,
                            format!("\"{}\" scheduled for {label}", drag.step.instruction),
                        ),
                    })
                    .await;
                Ok(todo)
            }
            Err(err) => {
                self.report_failure(&step_id, &err).await;
                Err(err)
            }
        }
    }

    fn claim(&self, step_id: &MealStepId) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(step_id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            step_id: step_id.clone(),
        })
    }

    async fn bridge(
        &self,
        drag: &StepDrag,
        date: NaiveDate,
    ) -> Result<(Todo, MealStep), MiseError> {
        let step = &drag.step;
        let request = CreateTodoRequest {
            description: format!("{}: {}", drag.meal_name, step.instruction),
            scheduled_for: Some(Schedule::Day(date)),
            relations: vec![TodoRelation {
                meal_instruction: Some(MealInstructionRef {
                    meal_step_id: step.id.clone(),
                    meal_id: step.meal_id.clone(),
                    recipe_id: None,
                    step_number: step.step_number,
                }),
            }],
        };
        let todo = self.todo_api.create_todo(request).await?;

        let link = StepLink {
            todo_id: todo.id.clone(),
            assigned_to_date: date,
        };
        match self.meal_api.link_step(&step.id, link).await {
            Ok(linked) => Ok((todo, linked)),
            Err(err) => {
                warn!(step_id = %step.id, todo_id = %todo.id, error = %err, "link failed, deleting created todo");
                if let Err(cleanup) = self.todo_api.delete_todo(&todo.id).await {
                    warn!(todo_id = %todo.id, error = %cleanup, "could not delete orphaned todo");
                }
                Err(err)
            }
        }
    }

    async fn report_failure(&self, step_id: &MealStepId, err: &MiseError) {
        warn!(step_id = %step_id, error = %err, "meal step not scheduled");
        self.sink
            .emit(DomainEvent::StepScheduleFailed {
                step_id: step_id.clone(),
                kind: err.kind(),
                notice: Notice::error(FAILURE_TITLE, FAILURE_HINT),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::StoreSettings;
    use crate::domain::{ErrorKind, MealWithDetails, NoticeLevel, TodoContext};
    use crate::impls::{ApiCall, InMemoryApi, RecordingEventSink};
    use crate::ports::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};

    struct Fixture {
        api: Arc<InMemoryApi>,
        sink: Arc<RecordingEventSink>,
        todos: TodoStore,
        planner: MealPlanner,
        bridge: StepBridge,
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(noon()));
        let api = Arc::new(InMemoryApi::new(clock.clone()));
        let mut step = MealStep::new("step-1", "meal-1", 1, "Preheat oven");
        step.estimated_duration_minutes = Some(10);
        api.seed_meals(vec![MealWithDetails::new("meal-1", "Sunday Dinner").with_step(step)]);

        let sink = Arc::new(RecordingEventSink::new());
        let todos = TodoStore::new(api.clone(), clock.clone(), StoreSettings::default());
        let planner = MealPlanner::new(api.clone(), clock.clone());
        let bridge = StepBridge::new(
            todos.clone(),
            planner.clone(),
            api.clone(),
            api.clone(),
            clock,
            sink.clone(),
        );
        Fixture {
            api,
            sink,
            todos,
            planner,
            bridge,
        }
    }

    async fn drag(f: &Fixture) -> StepDrag {
        f.planner.fetch_weekly_meals().await;
        let (meal_name, step) = f.planner.find_step(&"step-1".into()).await.unwrap();
        StepDrag::new(meal_name, step)
    }

    #[tokio::test]
    async fn drop_on_today_creates_linked_todo() {
        let f = fixture();
        let drag = drag(&f).await;

        let todo = f.bridge.schedule_step(drag, DropTarget::today()).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(todo.description, "Sunday Dinner: Preheat oven");
        assert_eq!(todo.scheduled_for, Some(Schedule::Day(today)));
        assert_eq!(todo.meal_step().map(|id| id.as_str()), Some("step-1"));
        assert!(matches!(todo.context, TodoContext::Meal { .. }));

        let snapshot = f.todos.snapshot().await;
        assert_eq!(snapshot.todos.len(), 1);
        let (_, step) = f.planner.find_step(&"step-1".into()).await.unwrap();
        assert_eq!(step.todo_id.as_ref(), Some(&todo.id));
        assert_eq!(step.assigned_to_date, Some(today));

        let events = f.sink.events().await;
        assert_eq!(events.len(), 1);
        let notice = events[0].notice();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.title, SUCCESS_TITLE);
        assert_eq!(notice.description, "\"Preheat oven\" scheduled for today");
    }

    #[tokio::test]
    async fn labelled_drop_uses_label() {
        let f = fixture();
        let drag = drag(&f).await;
        let friday = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();

        f.bridge
            .schedule_step(drag, DropTarget::on(friday, "Friday"))
            .await
            .unwrap();

        let events = f.sink.events().await;
        assert_eq!(events[0].notice().description, "\"Preheat oven\" scheduled for Friday");
    }

    #[tokio::test]
    async fn unlabelled_future_drop_names_the_day() {
        let f = fixture();
        let drag = drag(&f).await;
        let friday = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let target = DropTarget {
            date: Some(friday),
            date_label: None,
        };

        let todo = f.bridge.schedule_step(drag, target).await.unwrap();

        assert_eq!(todo.scheduled_for, Some(Schedule::Day(friday)));
        let events = f.sink.events().await;
        assert_eq!(
            events[0].notice().description,
            "\"Preheat oven\" scheduled for Fri Mar 7"
        );
    }

    #[tokio::test]
    async fn link_failure_deletes_created_todo() {
        let f = fixture();
        let drag = drag(&f).await;
        f.api
            .fail_next(ApiCall::LinkStep, MiseError::Network("down".into()));

        let err = f.bridge.schedule_step(drag, DropTarget::today()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);

        assert!(f.api.todos().is_empty());
        assert_eq!(f.api.call_count(ApiCall::DeleteTodo), 1);
        assert!(f.api.meals()[0].steps[0].todo_id.is_none());

        let events = f.sink.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].notice().title, FAILURE_TITLE);
        assert_eq!(events[0].notice().description, FAILURE_HINT);
    }

    #[tokio::test]
    async fn create_failure_leaves_step_untouched() {
        let f = fixture();
        let drag = drag(&f).await;
        f.api
            .fail_next(ApiCall::CreateTodo, MiseError::Validation("bad".into()));

        assert!(f.bridge.schedule_step(drag, DropTarget::today()).await.is_err());
        assert_eq!(f.api.call_count(ApiCall::LinkStep), 0);
        assert!(f.api.meals()[0].steps[0].todo_id.is_none());
    }

    #[tokio::test]
    async fn second_drop_of_same_step_is_rejected() {
        let f = fixture();
        let first = drag(&f).await;
        let stale_copy = first.clone();

        f.bridge.schedule_step(first, DropTarget::today()).await.unwrap();
        let err = f
            .bridge
            .schedule_step(stale_copy, DropTarget::today())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StaleState);
        assert_eq!(f.api.todos().len(), 1);
        assert_eq!(f.api.call_count(ApiCall::CreateTodo), 1);
        let events = f.sink.events().await;
        assert_eq!(events[1].notice().level, NoticeLevel::Error);
        assert_eq!(events[1].notice().description, FAILURE_HINT);
    }

    #[tokio::test]
    async fn repeat_drop_is_rejected_when_meal_refresh_fails() {
        let f = fixture();
        let first = drag(&f).await;
        let stale_copy = first.clone();
        f.api
            .fail_next(ApiCall::WeeklyMeals, MiseError::Network("down".into()));

        let todo = f.bridge.schedule_step(first, DropTarget::today()).await.unwrap();
        assert!(f.planner.error().await.is_some());

        let err = f
            .bridge
            .schedule_step(stale_copy, DropTarget::today())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StaleState);
        assert_eq!(f.api.call_count(ApiCall::CreateTodo), 1);
        assert_eq!(f.api.call_count(ApiCall::DeleteTodo), 0);
        assert_eq!(f.api.todos().len(), 1);
        let (_, step) = f.planner.find_step(&"step-1".into()).await.unwrap();
        assert_eq!(step.todo_id, Some(todo.id));
    }
}
