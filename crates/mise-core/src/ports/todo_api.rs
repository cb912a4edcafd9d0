//! TodoApi port - todo REST エンドポイントの抽象化
//!
//! # 実装
//! - **HttpApi**: reqwest（本番用）
//! - **InMemoryApi**: 開発用・テスト用（モックモード）

use async_trait::async_trait;

use crate::domain::{
    CreateTodoRequest, MiseError, TodayTodosResponse, Todo, TodoId, UpdateTodoRequest,
};

/// TodoApi は todo の正本（source of truth）へのインターフェース
///
/// # 設計原則
/// - すべてのメソッドが suspension point（await 中に他の操作が進みうる）
/// - 失敗は MiseError に分類して返す（panic しない）
#[async_trait]
pub trait TodoApi: Send + Sync {
    /// `GET /api/todos/today`
    async fn today_todos(&self) -> Result<TodayTodosResponse, MiseError>;

    /// `PUT /api/todos/{id}`
    async fn update_todo(&self, request: UpdateTodoRequest) -> Result<Todo, MiseError>;

    /// `POST /api/todos`
    async fn create_todo(&self, request: CreateTodoRequest) -> Result<Todo, MiseError>;

    /// `DELETE /api/todos/{id}`
    async fn delete_todo(&self, id: &TodoId) -> Result<(), MiseError>;
}
