use crate::structs::ApiResponse;
use async_trait::async_trait;

/// 管理接口后端能力：只负责发出 JSON POST 并把原始结果交回。
///
/// Implementations must not interpret the status code; classifying a
/// response as success or failure is the provisioning sequence's job.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// POST `body` as JSON to `path` (relative to the configured base URL).
    ///
    /// # Returns
    /// The raw status and body, or `Error::Transport` when no HTTP
    /// response was obtained at all.
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> crate::Result<ApiResponse>;
}
