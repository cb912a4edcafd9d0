//! MealApi port - 計画層（weekly meals）への抽象化
//!
//! 実行層から見ると計画層は外部の協力者です。
//! 必要なのは「週の meal を読み直す」と「step に todo を紐づける」の 2 つだけ。

use async_trait::async_trait;

use crate::domain::{MealStep, MealStepId, MiseError, StepLink, WeeklyMealsResponse};

#[async_trait]
pub trait MealApi: Send + Sync {
    /// `GET /api/meals/weekly`
    async fn weekly_meals(&self) -> Result<WeeklyMealsResponse, MiseError>;

    /// `PUT /api/meals/steps/{id}`
    async fn link_step(&self, step_id: &MealStepId, link: StepLink)
    -> Result<MealStep, MiseError>;
}
