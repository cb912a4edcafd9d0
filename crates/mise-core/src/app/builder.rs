//! SessionBuilder - store / planner / bridge のワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に config を検証し、API が揃っていなければ BuildError
//! - Clock と EventSink は省略可（SystemClock / TracingEventSink）

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::app::bridge::StepBridge;
use crate::app::planner::MealPlanner;
use crate::app::refresh_loop::{RefreshHandle, RefreshLoop};
use crate::app::store::{StoreSettings, TodoStore};
use crate::config::{ConfigError, MiseConfig};
use crate::domain::MiseError;
use crate::impls::{HttpApi, InMemoryApi, TracingEventSink};
use crate::ports::{Clock, EventSink, MealApi, SystemClock, TodoApi};

/// SessionBuilder は Session を構築
///
/// # 使用例
/// ```ignore
/// let session = SessionBuilder::new(MiseConfig::from_env()?)
///     .http()?
///     .build()?;
/// ```
pub struct SessionBuilder {
    config: MiseConfig,
    todo_api: Option<Arc<dyn TodoApi>>,
    meal_api: Option<Arc<dyn MealApi>>,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn EventSink>>,
}

/// BuildError は Session 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("missing {0} api; call todo_api()/meal_api(), http() or in_memory()")]
    MissingApi(&'static str),

    #[error("failed to set up http api: {0}")]
    Http(MiseError),
}

impl SessionBuilder {
    pub fn new(config: MiseConfig) -> Self {
        Self {
            config,
            todo_api: None,
            meal_api: None,
            clock: None,
            sink: None,
        }
    }

    pub fn todo_api(mut self, api: Arc<dyn TodoApi>) -> Self {
        self.todo_api = Some(api);
        self
    }

    pub fn meal_api(mut self, api: Arc<dyn MealApi>) -> Self {
        self.meal_api = Some(api);
        self
    }

    /// Use one in-memory server for both tiers.
    pub fn in_memory(self, api: Arc<InMemoryApi>) -> Self {
        self.todo_api(api.clone()).meal_api(api)
    }

    /// Use the REST service at `config.api_base_url` for both tiers.
    pub fn http(self) -> Result<Self, BuildError> {
        let api = Arc::new(HttpApi::from_config(&self.config).map_err(BuildError::Http)?);
        Ok(self.todo_api(api.clone()).meal_api(api))
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Session, BuildError> {
        self.config.validate()?;
        let todo_api = self.todo_api.ok_or(BuildError::MissingApi("todo"))?;
        let meal_api = self.meal_api.ok_or(BuildError::MissingApi("meal"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingEventSink));

        let todos = TodoStore::new(
            todo_api.clone(),
            clock.clone(),
            StoreSettings::from(&self.config),
        );
        let planner = MealPlanner::new(meal_api.clone(), clock.clone());
        let bridge = StepBridge::new(
            todos.clone(),
            planner.clone(),
            todo_api,
            meal_api,
            clock,
            sink,
        );

        Ok(Session {
            todos,
            planner,
            bridge,
            refresh_interval: self.config.refresh_interval(),
            refresh: None,
        })
    }
}

/// Session は 1 画面分の実行層
pub struct Session {
    pub todos: TodoStore,
    pub planner: MealPlanner,
    pub bridge: StepBridge,
    refresh_interval: Duration,
    refresh: Option<RefreshHandle>,
}

impl Session {
    /// Initial load of both tiers, then periodic todo refresh.
    pub async fn start(&mut self) {
        tokio::join!(self.todos.fetch_todos(), self.planner.fetch_weekly_meals());
        self.start_auto_refresh();
    }

    /// No-op if already running.
    pub fn start_auto_refresh(&mut self) {
        if self.refresh.as_ref().is_some_and(RefreshHandle::is_running) {
            return;
        }
        self.refresh = Some(RefreshLoop::spawn(&self.todos, self.refresh_interval));
    }

    pub async fn stop_auto_refresh(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.shutdown().await;
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.refresh.as_ref().is_some_and(RefreshHandle::is_running)
    }

    /// Stop the refresh loop and detach both caches from late responses.
    pub async fn close(mut self) {
        self.stop_auto_refresh().await;
        self.todos.close();
        self.planner.close();
        info!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Todo;
    use crate::impls::ApiCall;

    fn api() -> Arc<InMemoryApi> {
        let api = Arc::new(InMemoryApi::new(Arc::new(SystemClock)));
        api.seed_todos(vec![Todo::new("a", "a")]);
        api
    }

    #[test]
    fn build_without_api_fails() {
        let result = SessionBuilder::new(MiseConfig::default()).build();
        assert!(matches!(result, Err(BuildError::MissingApi("todo"))));
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = MiseConfig {
            refresh_interval_secs: 0,
            ..MiseConfig::default()
        };
        let result = SessionBuilder::new(config).in_memory(api()).build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[test]
    fn http_without_base_url_fails() {
        let result = SessionBuilder::new(MiseConfig::default()).http();
        assert!(matches!(result, Err(BuildError::Http(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn start_loads_and_close_stops_refresh() {
        let api = api();
        let mut session = SessionBuilder::new(MiseConfig::default())
            .in_memory(api.clone())
            .build()
            .unwrap();

        session.start().await;
        assert!(session.is_auto_refreshing());
        assert_eq!(session.todos.snapshot().await.todos.len(), 1);
        assert_eq!(api.call_count(ApiCall::WeeklyMeals), 1);

        let todos = session.todos.clone();
        session.close().await;
        assert!(todos.is_closed());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 1);
    }
}
