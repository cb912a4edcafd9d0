//! TodoStore - 実行層の todo キャッシュと楽観的更新
//!
//! # 責務
//! - `GET /api/todos/today` の結果を保持し、urgency を自分の Clock で再計算する
//! - complete / remove を即時に反映し、サーバが失敗したら補償する
//! - 古い fetch の応答が新しい状態を上書きしないよう sequence 番号で守る
//! - mutation 開始前に発行された fetch の応答も捨てる（楽観的反映を巻き戻さない）
//!
//! # 1 mutation の状態遷移
//! ```text
//! Pending ──ok──▶ Committed   (complete の場合は遅延 refetch で再同期)
//!    └─────err──▶ Reverted    (complete: 元の値に戻す / remove: refetch で復元)
//! ```
//!
//! # 並行性
//! - state は tokio Mutex で保護し、ネットワーク await の間は保持しない
//! - 楽観的反映と「リクエスト発行」の間に他の mutation は割り込めない
//! - close() 後に戻ってきた応答は state に触れない

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::feed::FeedView;
use crate::app::status::ProgressSummary;
use crate::config::MiseConfig;
use crate::domain::{
    CreateTodoRequest, ErrorKind, MiseError, Schedule, TodayTodosResponse, Todo, TodoCounts,
    TodoId, UpdateTodoRequest, UrgencyPolicy,
};
use crate::ports::{Clock, TodoApi};

/// Tunables the store reads on every operation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub policy: UrgencyPolicy,
    /// Delay before the follow-up fetch after a committed completion.
    pub reconcile_delay: Duration,
    pub completed_preview: usize,
    pub max_description_len: usize,
}

impl From<&MiseConfig> for StoreSettings {
    fn from(config: &MiseConfig) -> Self {
        Self {
            policy: config.urgency.clone(),
            reconcile_delay: config.reconcile_delay(),
            completed_preview: config.completed_preview,
            max_description_len: config.max_description_len,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&MiseConfig::default())
    }
}

/// What `retry()` re-runs for the current error.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryAction {
    Fetch,
    Complete(TodoId),
    Remove(TodoId),
    Create(CreateTodoRequest),
}

/// The single user-visible error slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
    pub retry: RetryAction,
}

impl StoreError {
    fn from_api(err: &MiseError, fallback: &str, retry: RetryAction) -> Self {
        let message = if err.message().is_empty() {
            fallback.to_string()
        } else {
            err.message().to_string()
        };
        Self {
            kind: err.kind(),
            message,
            retry,
        }
    }

    fn busy(id: &TodoId, retry: RetryAction) -> Self {
        Self {
            kind: ErrorKind::StaleState,
            message: format!("todo {id} is still being updated"),
            retry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Pending,
    Committed,
    Reverted,
}

/// Point-in-time copy of the store for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub todos: Vec<Todo>,
    pub counts: TodoCounts,
    pub loading: bool,
    pub error: Option<StoreError>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub pending_mutations: usize,
}

impl StoreSnapshot {
    pub fn is_settled(&self) -> bool {
        self.pending_mutations == 0
    }

    pub fn todo(&self, id: &TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| &t.id == id)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    todos: Vec<Todo>,
    counts: TodoCounts,
    in_flight_fetches: u32,
    error: Option<StoreError>,
    last_fetched: Option<DateTime<Utc>>,
    /// Last fetch sequence handed out.
    issued_seq: u64,
    /// Sequence of the fetch whose response is currently shown.
    applied_seq: u64,
    /// `issued_seq` when the latest mutation began. Fetches at or below it are stale.
    mutation_floor: u64,
    mutations: HashMap<TodoId, MutationPhase>,
}

impl StoreState {
    fn is_pending(&self, id: &TodoId) -> bool {
        self.mutations.get(id) == Some(&MutationPhase::Pending)
    }

    fn pending_count(&self) -> usize {
        self.mutations
            .values()
            .filter(|p| **p == MutationPhase::Pending)
            .count()
    }

    fn begin(&mut self, id: &TodoId) {
        self.mutations.insert(id.clone(), MutationPhase::Pending);
        self.mutation_floor = self.issued_seq;
    }

    fn settle(&mut self, id: &TodoId, phase: MutationPhase) {
        if let Some(p) = self.mutations.get_mut(id) {
            *p = phase;
        }
    }

    /// The response of fetch `seq` would overwrite newer local state.
    fn is_stale(&self, seq: u64) -> bool {
        seq < self.applied_seq || seq <= self.mutation_floor
    }

    fn replace(&mut self, response: TodayTodosResponse, policy: &UrgencyPolicy, now: DateTime<Utc>) {
        let mut todos = response.todos;
        for todo in &mut todos {
            policy.annotate(todo, now);
        }
        let mut counts = response.counts;

        // keep optimistic changes the server has not answered yet
        for (id, phase) in &self.mutations {
            if *phase != MutationPhase::Pending {
                continue;
            }
            let local = self.todos.iter().find(|t| &t.id == id);
            let Some(index) = todos.iter().position(|t| &t.id == id) else {
                continue;
            };
            match local {
                None => {
                    let removed = todos.remove(index);
                    counts.record_removal(removed.completed, removed.is_overdue);
                }
                Some(local) if local.completed && !todos[index].completed => {
                    counts.record_completion(todos[index].is_overdue);
                    todos[index] = local.clone();
                }
                Some(_) => {}
            }
        }

        self.todos = todos;
        self.counts = counts;
        self.mutations.retain(|_, p| *p == MutationPhase::Pending);
    }

    /// Returns the pre-mutation copy, or `None` when there is nothing to complete.
    fn apply_completion(
        &mut self,
        id: &TodoId,
        at: DateTime<Utc>,
        policy: &UrgencyPolicy,
    ) -> Option<Todo> {
        let todo = self.todos.iter_mut().find(|t| &t.id == id)?;
        if todo.completed {
            return None;
        }
        let before = todo.clone();
        todo.complete(at);
        policy.annotate(todo, at);
        self.counts.record_completion(before.is_overdue);
        Some(before)
    }

    /// Undo only if the todo still carries our optimistic completion.
    fn revert_completion(&mut self, before: &Todo, at: DateTime<Utc>) -> bool {
        let Some(todo) = self.todos.iter_mut().find(|t| t.id == before.id) else {
            return false;
        };
        if !(todo.completed && todo.completed_at == Some(at)) {
            return false;
        }
        *todo = before.clone();
        self.counts.undo_completion(before.is_overdue);
        true
    }

    fn apply_removal(&mut self, id: &TodoId) -> Option<Todo> {
        let index = self.todos.iter().position(|t| &t.id == id)?;
        let removed = self.todos.remove(index);
        self.counts
            .record_removal(removed.completed, removed.is_overdue);
        Some(removed)
    }
}

struct Inner {
    api: Arc<dyn TodoApi>,
    clock: Arc<dyn Clock>,
    settings: StoreSettings,
    state: Mutex<StoreState>,
    closed: AtomicBool,
}

/// TodoStore は実行層のクライアント側キャッシュ
///
/// `Clone` は同じ store へのハンドルを増やすだけ（Arc 共有）。
#[derive(Clone)]
pub struct TodoStore {
    inner: Arc<Inner>,
}

/// Non-owning handle for background tasks.
#[derive(Clone)]
pub struct WeakTodoStore {
    inner: Weak<Inner>,
}

impl WeakTodoStore {
    pub fn upgrade(&self) -> Option<TodoStore> {
        self.inner.upgrade().map(|inner| TodoStore { inner })
    }
}

impl TodoStore {
    pub fn new(api: Arc<dyn TodoApi>, clock: Arc<dyn Clock>, settings: StoreSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                clock,
                settings,
                state: Mutex::new(StoreState::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakTodoStore {
        WeakTodoStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    /// Stop applying results. In-flight requests still finish but are ignored.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("todo store closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Replace todos and counts with the server's view.
    ///
    /// Returns `true` when this call's response was applied. A response that
    /// arrives after a newer fetch has already been applied, or that was
    /// requested before a complete/remove started, is discarded.
    pub async fn fetch_todos(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        let seq = {
            let mut state = self.inner.state.lock().await;
            state.issued_seq += 1;
            state.in_flight_fetches += 1;
            state.error = None;
            state.issued_seq
        };
        debug!(seq, "fetching today's todos");

        let result = self.inner.api.today_todos().await;

        if self.is_closed() {
            debug!(seq, "store closed, dropping fetch result");
            return false;
        }
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock().await;
        state.in_flight_fetches = state.in_flight_fetches.saturating_sub(1);

        if state.is_stale(seq) {
            debug!(
                seq,
                applied = state.applied_seq,
                floor = state.mutation_floor,
                "discarding stale fetch response"
            );
            return false;
        }
        match result {
            Ok(response) => {
                state.applied_seq = seq;
                state.replace(response, &self.inner.settings.policy, now);
                state.last_fetched = Some(now);
                info!(
                    seq,
                    total = state.counts.total,
                    remaining = state.counts.remaining,
                    overdue = state.counts.overdue,
                    "todos refreshed"
                );
                true
            }
            Err(err) => {
                warn!(seq, error = %err, "failed to fetch todos");
                state.error = Some(StoreError::from_api(
                    &err,
                    "Failed to fetch todos",
                    RetryAction::Fetch,
                ));
                false
            }
        }
    }

    /// Mark a todo completed, optimistically.
    ///
    /// `None` means nothing happened: unknown id, already completed, another
    /// change to the same todo in flight, or the store is closed.
    pub async fn complete_todo(&self, id: &TodoId) -> Option<MutationPhase> {
        if self.is_closed() {
            return None;
        }
        let at = self.inner.clock.now();
        let before = {
            let mut state = self.inner.state.lock().await;
            if state.is_pending(id) {
                state.error = Some(StoreError::busy(id, RetryAction::Complete(id.clone())));
                return None;
            }
            let before = state.apply_completion(id, at, &self.inner.settings.policy)?;
            state.begin(id);
            before
        };
        debug!(todo_id = %id, "completion applied locally");

        let result = self
            .inner
            .api
            .update_todo(UpdateTodoRequest::completion(id.clone(), at))
            .await;

        let phase = match result {
            Ok(_) => MutationPhase::Committed,
            Err(_) => MutationPhase::Reverted,
        };
        if self.is_closed() {
            debug!(todo_id = %id, ?phase, "store closed, dropping completion result");
            return Some(phase);
        }

        let mut state = self.inner.state.lock().await;
        state.settle(id, phase);
        match result {
            Ok(_) => {
                drop(state);
                info!(todo_id = %id, "todo completed");
                self.schedule_reconcile();
            }
            Err(err) => {
                let reverted = state.revert_completion(&before, at);
                state.error = Some(StoreError::from_api(
                    &err,
                    "Failed to update todo",
                    RetryAction::Complete(id.clone()),
                ));
                warn!(todo_id = %id, error = %err, reverted, "completion rejected");
            }
        }
        Some(phase)
    }

    /// Remove a todo, optimistically. On failure the list is refetched.
    pub async fn remove_todo(&self, id: &TodoId) -> Option<MutationPhase> {
        if self.is_closed() {
            return None;
        }
        {
            let mut state = self.inner.state.lock().await;
            if state.is_pending(id) {
                state.error = Some(StoreError::busy(id, RetryAction::Remove(id.clone())));
                return None;
            }
            state.apply_removal(id)?;
            state.begin(id);
        }
        debug!(todo_id = %id, "removal applied locally");

        let result = self.inner.api.delete_todo(id).await;

        if self.is_closed() {
            return Some(match result {
                Ok(()) => MutationPhase::Committed,
                Err(_) => MutationPhase::Reverted,
            });
        }

        match result {
            Ok(()) => {
                self.inner
                    .state
                    .lock()
                    .await
                    .settle(id, MutationPhase::Committed);
                info!(todo_id = %id, "todo removed");
                Some(MutationPhase::Committed)
            }
            Err(err) => {
                self.inner
                    .state
                    .lock()
                    .await
                    .settle(id, MutationPhase::Reverted);
                warn!(todo_id = %id, error = %err, "removal rejected, refetching");

                self.fetch_todos().await;

                if !self.is_closed() {
                    self.inner.state.lock().await.error = Some(StoreError::from_api(
                        &err,
                        "Failed to delete todo",
                        RetryAction::Remove(id.clone()),
                    ));
                }
                Some(MutationPhase::Reverted)
            }
        }
    }

    /// Create a standalone todo, then refetch.
    ///
    /// Blank or over-long descriptions are rejected before any request.
    pub async fn create_todo(
        &self,
        description: &str,
        scheduled_for: Option<Schedule>,
    ) -> Result<Todo, MiseError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(MiseError::Validation(
                "Please enter a task description".to_string(),
            ));
        }
        let max = self.inner.settings.max_description_len;
        if description.chars().count() > max {
            return Err(MiseError::Validation(format!(
                "Description must be at most {max} characters"
            )));
        }

        self.submit_create(CreateTodoRequest {
            description: description.to_string(),
            scheduled_for,
            relations: Vec::new(),
        })
        .await
    }

    async fn submit_create(&self, request: CreateTodoRequest) -> Result<Todo, MiseError> {
        if self.is_closed() {
            return Err(MiseError::StaleState("todo store is closed".to_string()));
        }
        match self.inner.api.create_todo(request.clone()).await {
            Ok(todo) => {
                info!(todo_id = %todo.id, "todo created");
                self.fetch_todos().await;
                Ok(todo)
            }
            Err(err) => {
                warn!(error = %err, "failed to create todo");
                if !self.is_closed() {
                    self.inner.state.lock().await.error = Some(StoreError::from_api(
                        &err,
                        "Failed to create todo",
                        RetryAction::Create(request),
                    ));
                }
                Err(err)
            }
        }
    }

    /// Re-run whatever produced the current error.
    ///
    /// Non-network failures refetch first so the retry works on fresh state.
    pub async fn retry(&self) {
        let Some(error) = self.inner.state.lock().await.error.take() else {
            return;
        };
        debug!(retry = ?error.retry, kind = ?error.kind, "retrying");

        if !error.kind.is_retryable() && error.retry != RetryAction::Fetch {
            self.fetch_todos().await;
        }
        match error.retry {
            RetryAction::Fetch => {
                self.fetch_todos().await;
            }
            RetryAction::Complete(id) => {
                self.complete_todo(&id).await;
            }
            RetryAction::Remove(id) => {
                self.remove_todo(&id).await;
            }
            RetryAction::Create(request) => {
                // failure is recorded in the error slot again
                let _ = self.submit_create(request).await;
            }
        }
    }

    pub async fn clear_error(&self) {
        self.inner.state.lock().await.error = None;
    }

    pub async fn error(&self) -> Option<StoreError> {
        self.inner.state.lock().await.error.clone()
    }

    pub async fn counts(&self) -> TodoCounts {
        self.inner.state.lock().await.counts
    }

    pub async fn is_settled(&self) -> bool {
        self.inner.state.lock().await.pending_count() == 0
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.inner.state.lock().await;
        StoreSnapshot {
            todos: state.todos.clone(),
            counts: state.counts,
            loading: state.in_flight_fetches > 0,
            error: state.error.clone(),
            last_fetched: state.last_fetched,
            pending_mutations: state.pending_count(),
        }
    }

    pub async fn feed(&self) -> FeedView {
        let state = self.inner.state.lock().await;
        FeedView::build(&state.todos, self.inner.settings.completed_preview)
    }

    pub async fn progress(&self) -> ProgressSummary {
        let state = self.inner.state.lock().await;
        ProgressSummary::compute(&state.todos, &state.counts)
    }

    fn schedule_reconcile(&self) {
        let store = self.downgrade();
        let delay = self.inner.settings.reconcile_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(store) = store.upgrade()
                && !store.is_closed()
            {
                debug!("reconciling after completion");
                store.fetch_todos().await;
            }
        });
    }
}
