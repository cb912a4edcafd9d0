//! mise-core
//!
//! Execution tier of the meal planner: today's todo feed, optimistic
//! completion, and the bridge that turns planned cooking steps into todos.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, todo, meal, urgency, counts, errors, events）
//! - **ports**: 抽象化レイヤー（TodoApi, MealApi, Clock, IdGenerator, EventSink）
//! - **app**: アプリケーションロジック（store, planner, bridge, refresh_loop, builder, feed, status）
//! - **impls**: 実装（HttpApi, InMemoryApi, event sinks）
//! - **config**: 実行時設定（JSON / `MISE_*` 環境変数）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use config::{ConfigError, MiseConfig};
