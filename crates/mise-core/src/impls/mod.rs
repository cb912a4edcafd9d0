//! Impls - ports の実装
//!
//! - **HttpApi**: REST サービス（reqwest）
//! - **InMemoryApi**: モックモード・テスト用
//! - **TracingEventSink / RecordingEventSink**: 通知の出口

pub mod event_sink;
pub mod http_api;
pub mod inmem_api;

pub use self::event_sink::{RecordingEventSink, TracingEventSink};
pub use self::http_api::HttpApi;
pub use self::inmem_api::{ApiCall, InMemoryApi};
