//! Domain identifiers (strongly-typed IDs).
//!
//! # 文字列ベースの ID + Phantom Type
//! Todo / Meal / MealStep の ID は REST サーバが発行する不透明な文字列です。
//! `Id<T>` というジェネリック型で共通実装を提供し、
//! `T` はマーカー型（PhantomData）としてコンパイル時の型安全性だけを担います。
//!
//! - TodoId と MealStepId は混同できない
//! - wire 上はただの文字列（`#[serde(transparent)]`）
//! - in-memory API が ID を発行するときは ULID + プレフィックスを使う

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// ID を発行するときのプレフィックス（"todo-", "meal-", "step-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let todo_id = TodoId::new("todo-1");
/// let step_id = MealStepId::new("step-1");
/// // todo_id と step_id は異なる型なので、混同できない
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// ULID から `<prefix><ulid>` 形式の ID を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self::new(format!("{}{}", T::prefix(), ulid.to_string().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Todo {}

impl IdMarker for Todo {
    fn prefix() -> &'static str {
        "todo-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Meal {}

impl IdMarker for Meal {
    fn prefix() -> &'static str {
        "meal-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MealStep {}

impl IdMarker for MealStep {
    fn prefix() -> &'static str {
        "step-"
    }
}

// ========================================
// Type Alias
// ========================================

/// Identifier of a Todo (execution tier).
pub type TodoId = Id<Todo>;

/// Identifier of a planned Meal.
pub type MealId = Id<Meal>;

/// Identifier of a cooking step inside a planned Meal.
pub type MealStepId = Id<MealStep>;
