use serde::{Deserialize, Serialize};

// SEMP v2 请求体。字段名与管理接口保持一致 (camelCase)。

/// `POST /msgVpns` 的请求体：创建一个 Message VPN。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MsgVpnRequest {
    pub msg_vpn_name: String,
    pub enabled: bool,
    pub authentication_basic_enabled: bool,
    pub authentication_basic_profile_name: String,
    pub max_msg_spool_usage: u64,
    pub max_connection_count: u64,
    pub max_subscription_count: u64,
    pub max_ingress_flow_count: u64,
    pub max_egress_flow_count: u64,
}

impl MsgVpnRequest {
    pub fn new(msg_vpn_name: impl Into<String>) -> Self {
        Self {
            msg_vpn_name: msg_vpn_name.into(),
            enabled: true,
            authentication_basic_enabled: true,
            authentication_basic_profile_name: "default".to_string(),
            max_msg_spool_usage: 100,
            max_connection_count: 100,
            max_subscription_count: 1000,
            max_ingress_flow_count: 100,
            max_egress_flow_count: 100,
        }
    }
}

/// `POST /msgVpns/{vpn}/queues` 的请求体。
/// 请求队列和回复队列使用同一个形状，只有 `queueName` 不同。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub queue_name: String,
    pub access_type: String,
    pub permission: String,
    pub max_msg_size: u64,
    pub reject_msg_to_sender_on_discard_behavior: String,
}

impl QueueRequest {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            access_type: "exclusive".to_string(),
            permission: "consume".to_string(),
            max_msg_size: 100,
            reject_msg_to_sender_on_discard_behavior: "always".to_string(),
        }
    }
}

/// `POST /msgVpns/{vpn}/queues/{queue}/subscriptions` 的请求体。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub msg_vpn_name: String,
    pub queue_name: String,
    pub subscription_topic: String,
}

/// Raw answer from the management API. The status is not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "")
    }

    /// 2xx 即成功
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort decode of the SEMP error envelope, only used for log fields.
    pub fn semp_error(&self) -> Option<SempError> {
        serde_json::from_str::<SempErrorBody>(&self.body)
            .ok()
            .and_then(|b| b.meta.error)
    }
}

/// `{"meta":{"error":{...}}}`
#[derive(Debug, Clone, Deserialize)]
pub struct SempErrorBody {
    pub meta: SempMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SempMeta {
    #[serde(default)]
    pub error: Option<SempError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SempError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
