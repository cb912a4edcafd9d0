//! Domain model (IDs, todos, counts, urgency, meals, errors, events).
//!
//! このモジュールは I/O を持ちません。
//! - ids: 文字列ベースの型付き ID
//! - todo / counts: 実行層（todo feed）のデータ
//! - urgency: 緊急度の分類（純粋関数）
//! - meal: 計画層（meal step）のデータ
//! - errors / events: エラー分類と通知イベント

pub mod counts;
pub mod errors;
pub mod events;
pub mod ids;
pub mod meal;
pub mod todo;
pub mod urgency;

pub use self::counts::TodoCounts;
pub use self::errors::{ErrorKind, MiseError};
pub use self::events::{DomainEvent, Notice, NoticeLevel};
pub use self::ids::{MealId, MealStepId, TodoId};
pub use self::meal::{MealStep, MealWithDetails, StepLink, WeeklyMealsResponse, WeeklySummary};
pub use self::todo::{
    CreateTodoRequest, MealInstructionRef, Schedule, TodayTodosResponse, Todo, TodoContext,
    TodoRelation, UpdateTodoRequest,
};
pub use self::urgency::{Classification, Urgency, UrgencyPolicy};
