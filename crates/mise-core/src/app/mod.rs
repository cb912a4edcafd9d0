//! App - アプリケーション層
//!
//! ports を組み合わせて実行層のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TodoStore**: todo キャッシュと楽観的更新
//! - **MealPlanner**: weekly meals の読み取りキャッシュ
//! - **StepBridge**: meal step → todo の変換
//! - **RefreshLoop**: 定期 refetch
//! - **FeedView / ProgressSummary**: 表示用の派生ビュー
//! - **SessionBuilder**: 上記のワイヤリング

pub mod bridge;
pub mod builder;
pub mod feed;
pub mod planner;
pub mod refresh_loop;
pub mod status;
pub mod store;

// 主要な型を再エクスポート
pub use self::bridge::{DropTarget, StepBridge, StepDrag};
pub use self::builder::{BuildError, Session, SessionBuilder};
pub use self::feed::FeedView;
pub use self::planner::MealPlanner;
pub use self::refresh_loop::{RefreshHandle, RefreshLoop};
pub use self::status::ProgressSummary;
pub use self::store::{
    MutationPhase, RetryAction, StoreError, StoreSettings, StoreSnapshot, TodoStore, WeakTodoStore,
};
