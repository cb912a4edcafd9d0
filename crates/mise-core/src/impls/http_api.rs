//! HttpApi - REST サービスへの reqwest 実装
//!
//! # エンドポイント
//! | call          | method | path                      |
//! |---------------|--------|---------------------------|
//! | today_todos   | GET    | /api/todos/today          |
//! | create_todo   | POST   | /api/todos                |
//! | update_todo   | PUT    | /api/todos/{id}           |
//! | delete_todo   | DELETE | /api/todos/{id}           |
//! | weekly_meals  | GET    | /api/meals/weekly         |
//! | link_step     | PUT    | /api/meals/steps/{id}     |
//!
//! # エラー分類
//! - 404 / 410 → NotFound、409 / 412 → StaleState、その他 4xx → Validation
//! - 5xx・接続失敗・タイムアウト・壊れた body → Network
//! - メッセージは JSON body の `message` を優先

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::MiseConfig;
use crate::domain::{
    CreateTodoRequest, MealStep, MealStepId, MiseError, StepLink, TodayTodosResponse, Todo,
    TodoId, UpdateTodoRequest, WeeklyMealsResponse,
};
use crate::ports::{MealApi, TodoApi};

pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, MiseError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MiseError::Validation(format!("invalid api base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MiseError::Validation(format!(
                "api base url cannot be a base: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MiseError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &MiseConfig) -> Result<Self, MiseError> {
        let base_url = config
            .api_base_url
            .as_deref()
            .ok_or_else(|| MiseError::Validation("api base url is not configured".to_string()))?;
        Self::new(base_url, config.api_token.clone(), config.request_timeout())
    }

    /// Base URL joined with path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "api request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, MiseError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = MiseError::from_status(status.as_u16(), error_message(status.as_u16(), &body));
        warn!(status = status.as_u16(), error = %err, "api request failed");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, MiseError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| MiseError::Network(format!("invalid response body: {e}")))
    }
}

fn transport_error(err: reqwest::Error) -> MiseError {
    if err.is_timeout() {
        MiseError::Network("request timed out".to_string())
    } else {
        MiseError::Network(err.to_string())
    }
}

/// `message` from a JSON error body, or a generic message for the status.
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"))
}

#[async_trait]
impl TodoApi for HttpApi {
    async fn today_todos(&self) -> Result<TodayTodosResponse, MiseError> {
        self.send_json(self.request(Method::GET, &["api", "todos", "today"]))
            .await
    }

    async fn update_todo(&self, request: UpdateTodoRequest) -> Result<Todo, MiseError> {
        let builder = self
            .request(Method::PUT, &["api", "todos", request.id.as_str()])
            .json(&request);
        self.send_json(builder).await
    }

    async fn create_todo(&self, request: CreateTodoRequest) -> Result<Todo, MiseError> {
        let builder = self.request(Method::POST, &["api", "todos"]).json(&request);
        self.send_json(builder).await
    }

    async fn delete_todo(&self, id: &TodoId) -> Result<(), MiseError> {
        self.send(self.request(Method::DELETE, &["api", "todos", id.as_str()]))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl MealApi for HttpApi {
    async fn weekly_meals(&self) -> Result<WeeklyMealsResponse, MiseError> {
        self.send_json(self.request(Method::GET, &["api", "meals", "weekly"]))
            .await
    }

    async fn link_step(&self, step_id: &MealStepId, link: StepLink) -> Result<MealStep, MiseError> {
        let builder = self
            .request(Method::PUT, &["api", "meals", "steps", step_id.as_str()])
            .json(&link);
        self.send_json(builder).await
    }
}
