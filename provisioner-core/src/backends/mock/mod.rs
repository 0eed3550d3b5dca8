use crate::structs::ApiResponse;
use crate::traits::ManagementApi;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// One request as seen by [`MockApi`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(ApiResponse),
    TransportFailure(String),
}

/// A mock management API for tests and `--dry-run`.
/// It records every call in order and answers from a script: a per-call
/// entry (by 0-based call index) wins over a per-path entry; anything
/// unscripted gets `200` with an empty body.
#[derive(Debug, Default)]
pub struct MockApi {
    script: HashMap<String, Scripted>,
    // 两个队列步骤 POST 到同一路径，只能按调用序号区分
    nth: HashMap<usize, Scripted>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `path` with `status` and `body`.
    pub fn respond(mut self, path: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.script
            .insert(path.into(), Scripted::Respond(ApiResponse::new(status, body)));
        self
    }

    /// Fail `path` as if the connection could not be made.
    pub fn fail_transport(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.script
            .insert(path.into(), Scripted::TransportFailure(message.into()));
        self
    }

    /// Answer only the `index`-th call (0-based) with `status` and `body`.
    pub fn respond_nth(mut self, index: usize, status: u16, body: impl Into<String>) -> Self {
        self.nth
            .insert(index, Scripted::Respond(ApiResponse::new(status, body)));
        self
    }

    /// 按调用顺序返回已记录的请求
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ManagementApi for MockApi {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        tracing::info!("🤖 [MockApi] POST {} {}", path, body);
        let index = {
            let mut calls = self.calls.lock().await;
            calls.push(RecordedCall {
                path: path.to_string(),
                body: body.clone(),
            });
            calls.len() - 1
        };

        match self.nth.get(&index).or_else(|| self.script.get(path)) {
            Some(Scripted::Respond(resp)) => Ok(resp.clone()),
            Some(Scripted::TransportFailure(msg)) => Err(Error::Transport(msg.clone())),
            None => Ok(ApiResponse::ok()),
        }
    }
}
