//! InMemoryApi - 開発用のモック API（todo + meal の両方）
//!
//! # 用途
//! - CLI のモックモード（`MISE_API_URL` 未設定時）
//! - テスト: 失敗注入（`fail_next`）と遅延注入（`delay_next`）、呼び出し回数の記録
//!
//! # 実装詳細
//! - 状態は std Mutex で保護し、await の前に必ず解放する
//! - 応答は呼び出し時点の状態から作り、遅延はその後に入れる
//!   （遅延中にサーバ側が変わっても古い応答が返る）
//! - サーバ側の副作用も再現する: meal 由来の todo を完了すると step も完了、
//!   todo を削除すると step の紐づけが外れる

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveTime};
use tracing::debug;

use crate::domain::{
    CreateTodoRequest, MealStep, MealStepId, MealWithDetails, MiseError, Schedule, StepLink,
    TodayTodosResponse, Todo, TodoContext, TodoCounts, TodoId, UpdateTodoRequest, UrgencyPolicy,
    WeeklyMealsResponse, WeeklySummary,
};
use crate::ports::{Clock, IdGenerator, MealApi, TodoApi, UlidGenerator};

/// Which endpoint a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    TodayTodos,
    UpdateTodo,
    CreateTodo,
    DeleteTodo,
    WeeklyMeals,
    LinkStep,
}

#[derive(Default)]
struct ServerState {
    todos: Vec<Todo>,
    meals: Vec<MealWithDetails>,
    failures: HashMap<ApiCall, VecDeque<MiseError>>,
    delays: HashMap<ApiCall, VecDeque<Duration>>,
    calls: HashMap<ApiCall, u32>,
}

impl ServerState {
    /// Count the call and pop any injected failure / delay.
    fn enter(&mut self, call: ApiCall) -> (Option<MiseError>, Option<Duration>) {
        *self.calls.entry(call).or_default() += 1;
        let failure = self.failures.get_mut(&call).and_then(VecDeque::pop_front);
        let delay = self.delays.get_mut(&call).and_then(VecDeque::pop_front);
        (failure, delay)
    }

    fn step_mut(&mut self, step_id: &MealStepId) -> Option<&mut MealStep> {
        self.meals
            .iter_mut()
            .flat_map(|m| m.steps.iter_mut())
            .find(|s| &s.id == step_id)
    }
}

/// InMemoryApi は TodoApi と MealApi の両方を実装するモックサーバ
pub struct InMemoryApi {
    state: Mutex<ServerState>,
    clock: Arc<dyn Clock>,
    ids: UlidGenerator<Arc<dyn Clock>>,
    policy: UrgencyPolicy,
}

impl InMemoryApi {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            ids: UlidGenerator::new(clock.clone()),
            clock,
            policy: UrgencyPolicy::default(),
        }
    }

    /// Pre-populated with one meal and a couple of todos for the CLI demo.
    pub fn with_demo_data(clock: Arc<dyn Clock>) -> Self {
        let api = Self::new(clock);
        let now = api.clock.now();
        let today = api.policy.today(now);
        let dinner_time = today
            .and_time(NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default())
            .and_utc();

        let meal_id = api.ids.meal_id();
        let steps = [
            (1, "Preheat oven to 220°C", Some(10)),
            (2, "Season the chicken and rest for 30 minutes", Some(30)),
            (3, "Roast vegetables", Some(40)),
        ];
        let mut meal = MealWithDetails::new(meal_id.clone(), "Sunday Dinner");
        meal.scheduled_to_be_eaten_at = Some(dinner_time);
        for (number, instruction, minutes) in steps {
            let mut step = MealStep::new(api.ids.step_id(), meal_id.clone(), number, instruction);
            step.estimated_duration_minutes = minutes;
            meal = meal.with_step(step);
        }

        let todos = vec![
            Todo::new(api.ids.todo_id(), "Buy fresh basil")
                .scheduled(Schedule::Day(today))
                .startable(),
            Todo::new(api.ids.todo_id(), "Defrost the chicken")
                .scheduled(Schedule::At(now - ChronoDuration::hours(1))),
            Todo::new(api.ids.todo_id(), "Sharpen knives"),
        ];

        api.seed_meals(vec![meal]);
        api.seed_todos(todos);
        api
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seed_todos(&self, todos: Vec<Todo>) {
        self.lock().todos = todos;
    }

    pub fn seed_meals(&self, meals: Vec<MealWithDetails>) {
        self.lock().meals = meals;
    }

    /// Make the next call to `call` fail with `error`. Queued per endpoint.
    pub fn fail_next(&self, call: ApiCall, error: MiseError) {
        self.lock().failures.entry(call).or_default().push_back(error);
    }

    /// Hold the next response to `call` back by `delay`.
    pub fn delay_next(&self, call: ApiCall, delay: Duration) {
        self.lock().delays.entry(call).or_default().push_back(delay);
    }

    pub fn call_count(&self, call: ApiCall) -> u32 {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Server-side view of the todos.
    pub fn todos(&self) -> Vec<Todo> {
        self.lock().todos.clone()
    }

    pub fn meals(&self) -> Vec<MealWithDetails> {
        self.lock().meals.clone()
    }

    async fn respond<T>(
        &self,
        call: ApiCall,
        handle: impl FnOnce(&mut ServerState) -> Result<T, MiseError>,
    ) -> Result<T, MiseError> {
        let (result, delay) = {
            let mut state = self.lock();
            let (failure, delay) = state.enter(call);
            let result = match failure {
                Some(err) => Err(err),
                None => handle(&mut state),
            };
            (result, delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        debug!(?call, ok = result.is_ok(), "in-memory api call");
        result
    }

    fn summarize(&self, meals: &[MealWithDetails]) -> WeeklySummary {
        let today = self.policy.today(self.clock.now());
        let completed_meals = meals.iter().filter(|m| m.has_meal_been_consumed).count() as u32;
        WeeklySummary {
            total_meals: meals.len() as u32,
            completed_meals,
            upcoming_meals: meals.len() as u32 - completed_meals,
            overdue_steps: meals
                .iter()
                .flat_map(|m| &m.steps)
                .filter(|s| !s.is_step_completed && s.assigned_to_date.is_some_and(|d| d < today))
                .count() as u32,
        }
    }
}

#[async_trait]
impl TodoApi for InMemoryApi {
    async fn today_todos(&self) -> Result<TodayTodosResponse, MiseError> {
        let now = self.clock.now();
        self.respond(ApiCall::TodayTodos, |state| {
            let mut todos = state.todos.clone();
            for todo in &mut todos {
                self.policy.annotate(todo, now);
            }
            let counts = TodoCounts::tally(&todos);
            Ok(TodayTodosResponse { todos, counts })
        })
        .await
    }

    async fn update_todo(&self, request: UpdateTodoRequest) -> Result<Todo, MiseError> {
        let now = self.clock.now();
        self.respond(ApiCall::UpdateTodo, |state| {
            let todo = state
                .todos
                .iter_mut()
                .find(|t| t.id == request.id)
                .ok_or_else(|| MiseError::NotFound(format!("todo {}", request.id)))?;

            if let Some(description) = request.description {
                todo.description = description;
            }
            if let Some(schedule) = request.scheduled_for {
                todo.scheduled_for = Some(schedule);
            }
            match request.completed {
                Some(true) => todo.complete(request.completed_at.unwrap_or(now)),
                Some(false) => {
                    todo.completed = false;
                    todo.completed_at = None;
                }
                None => {}
            }
            let updated = todo.clone();

            if let Some(step_id) = updated.meal_step()
                && let Some(step) = state.step_mut(step_id)
            {
                step.is_step_completed = updated.completed;
            }
            Ok(updated)
        })
        .await
    }

    async fn create_todo(&self, request: CreateTodoRequest) -> Result<Todo, MiseError> {
        let id = self.ids.todo_id();
        let now = self.clock.now();
        self.respond(ApiCall::CreateTodo, |state| {
            let description = request.description.trim();
            if description.is_empty() {
                return Err(MiseError::Validation("description is required".to_string()));
            }

            let context = request
                .relations
                .iter()
                .find_map(|r| r.meal_instruction.as_ref())
                .and_then(|link| {
                    let meal = state.meals.iter().find(|m| m.id == link.meal_id)?;
                    let step = meal.steps.iter().find(|s| s.id == link.meal_step_id);
                    Some(TodoContext::Meal {
                        meal_name: meal.meal_name.clone(),
                        step_number: Some(link.step_number),
                        estimated_duration: step.and_then(|s| s.estimated_duration_minutes),
                    })
                })
                .unwrap_or_default();

            let mut todo = Todo::new(id, description).with_context(context);
            todo.scheduled_for = request.scheduled_for;
            todo.relations = request.relations;
            todo.created_at = Some(now);
            state.todos.push(todo.clone());
            Ok(todo)
        })
        .await
    }

    async fn delete_todo(&self, id: &TodoId) -> Result<(), MiseError> {
        self.respond(ApiCall::DeleteTodo, |state| {
            let index = state
                .todos
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| MiseError::NotFound(format!("todo {id}")))?;
            let removed = state.todos.remove(index);

            if let Some(step_id) = removed.meal_step()
                && let Some(step) = state.step_mut(step_id)
                && step.todo_id.as_ref() == Some(id)
            {
                step.todo_id = None;
                step.assigned_to_date = None;
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl MealApi for InMemoryApi {
    async fn weekly_meals(&self) -> Result<WeeklyMealsResponse, MiseError> {
        self.respond(ApiCall::WeeklyMeals, |state| {
            let meals = state.meals.clone();
            let summary = self.summarize(&meals);
            Ok(WeeklyMealsResponse { meals, summary })
        })
        .await
    }

    async fn link_step(&self, step_id: &MealStepId, link: StepLink) -> Result<MealStep, MiseError> {
        self.respond(ApiCall::LinkStep, |state| {
            let step = state
                .step_mut(step_id)
                .ok_or_else(|| MiseError::NotFound(format!("meal step {step_id}")))?;
            if let Some(existing) = &step.todo_id
                && existing != &link.todo_id
            {
                return Err(MiseError::StaleState(format!(
                    "meal step {step_id} is already linked to todo {existing}"
                )));
            }
            step.todo_id = Some(link.todo_id);
            step.assigned_to_date = Some(link.assigned_to_date);
            Ok(step.clone())
        })
        .await
    }
}
