//! RefreshLoop - todo feed の定期 refetch
//!
//! # フロー
//! 1. interval ごとに `TodoStore::fetch_todos()`
//! 2. 停止は `RefreshHandle::shutdown()` か handle の drop
//! 3. store が drop / close 済みならループ自身も終了
//!
//! 最初の tick は spawn 直後ではなく 1 interval 後（初回 fetch は呼び出し側が行う）。
//! interval は `MIN_INTERVAL` 未満にならない。

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app::store::TodoStore;

/// Shortest interval the loop accepts.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct RefreshLoop;

impl RefreshLoop {
    /// Start refreshing `store` every `interval`. The loop holds only a weak handle.
    pub fn spawn(store: &TodoStore, interval: Duration) -> RefreshHandle {
        if interval < MIN_INTERVAL {
            warn!(requested_ms = interval.as_millis() as u64, "refresh interval too short, clamping");
        }
        let interval = interval.max(MIN_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = store.downgrade();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "refresh loop started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        if store.is_closed() {
                            break;
                        }
                        debug!("periodic refresh");
                        store.fetch_todos().await;
                    }
                }
            }
            info!("refresh loop stopped");
        });

        RefreshHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

/// Owner of a running refresh loop.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Signal the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::store::StoreSettings;
    use crate::domain::Todo;
    use crate::impls::{ApiCall, InMemoryApi};
    use crate::ports::{Clock, SystemClock};
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryApi>, TodoStore) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let api = Arc::new(InMemoryApi::new(clock.clone()));
        api.seed_todos(vec![Todo::new("a", "a")]);
        let store = TodoStore::new(api.clone(), clock, StoreSettings::default());
        (api, store)
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_once_per_interval() {
        let (api, store) = setup();
        let handle = RefreshLoop::spawn(&store, Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 0);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let (api, store) = setup();
        let handle = RefreshLoop::spawn(&store, Duration::ZERO);

        tokio::time::sleep(MIN_INTERVAL / 2).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 0);

        tokio::time::sleep(MIN_INTERVAL).await;
        assert!(handle.is_running());
        assert_eq!(api.call_count(ApiCall::TodayTodos), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_further_fetches() {
        let (api, store) = setup();
        let handle = RefreshLoop::spawn(&store, Duration::from_secs(60));
        assert!(handle.is_running());

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_loop() {
        let (api, store) = setup();
        drop(RefreshLoop::spawn(&store, Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(api.call_count(ApiCall::TodayTodos), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_exits_when_store_closes() {
        let (api, store) = setup();
        let handle = RefreshLoop::spawn(&store, Duration::from_secs(60));
        store.close();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!handle.is_running());
        assert_eq!(api.call_count(ApiCall::TodayTodos), 0);
    }
}
