//! IdGenerator port - ID 生成の抽象化
//!
//! 本番ではサーバが ID を発行します。クライアント側で ID が必要になるのは
//! in-memory API（開発用のモックモード）だけです。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::ids::{MealId, MealStepId, TodoId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は衝突しない ID を生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 調整なしで生成可能
pub trait IdGenerator: Send + Sync {
    fn todo_id(&self) -> TodoId;

    fn meal_id(&self) -> MealId;

    fn step_id(&self) -> MealStepId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って時刻部分を決めるので、FixedClock を渡すと
/// timestamp 部分が固定された ID が得られます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn todo_id(&self) -> TodoId {
        TodoId::from_ulid(self.next_ulid())
    }

    fn meal_id(&self) -> MealId {
        MealId::from_ulid(self.next_ulid())
    }

    fn step_id(&self) -> MealStepId {
        MealStepId::from_ulid(self.next_ulid())
    }
}
