// 后端：SEMP v2 HTTP 客户端
// 整个运行期间只构造一次，Basic 认证头在构造时计算好并复用。

use crate::config::ConnectionSettings;
use crate::structs::ApiResponse;
use crate::traits::ManagementApi;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::Client;

pub struct SempHttpClient {
    client: Client,
    base_url: String,
}

impl SempHttpClient {
    pub fn new(settings: &ConnectionSettings) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&basic_auth_value(
            &settings.username,
            &settings.password,
        ))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }
}

/// `Basic base64(username:password)`
pub fn basic_auth_value(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

#[async_trait]
impl ManagementApi for SempHttpClient {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Transport(format!("cannot connect to {}: {}", self.base_url, e))
                } else {
                    Error::Transport(e.to_string())
                }
            })?;

        // 状态行已经到达：读取响应体失败不能改变结果
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                tracing::warn!(%url, status = status.as_u16(), error = %e, "Accepted, but response body could not be read");
                String::new()
            }
            Err(e) => format!("failed to read response body: {}", e),
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}
