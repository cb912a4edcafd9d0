//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! REST サービス・時刻・ID 生成・通知の出口をすべて trait にして、
//! app 層がそれらの実装詳細を知らずに済むようにします。
//!
//! # 設計原則
//! - REST サービスが source of truth（正本）
//! - クライアントのキャッシュは楽観的更新で先行し、後から正本に合わせる

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod meal_api;
pub mod todo_api;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::meal_api::MealApi;
pub use self::todo_api::TodoApi;
