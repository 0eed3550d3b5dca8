//! The provisioning sequence: VPN, request queue, reply queue, then one
//! topic subscription per queue.
//!
//! Steps run strictly one after another and a failed step never stops the
//! ones after it. The broker's own error responses are the feedback for
//! dependency violations (e.g. queues created against a missing VPN).

use crate::config::ConnectionSettings;
use crate::structs::{MsgVpnRequest, QueueRequest, SubscriptionRequest};
use crate::traits::ManagementApi;
use crate::Error;
use serde::Serialize;
use std::fmt;

/// 单个配置步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStep {
    CreateVpn { vpn: String },
    CreateRequestQueue { vpn: String, queue: String },
    CreateReplyQueue { vpn: String, queue: String },
    CreateSubscription { vpn: String, queue: String, topic: String },
}

impl ProvisioningStep {
    /// Path relative to the SEMP base URL.
    pub fn path(&self) -> String {
        match self {
            Self::CreateVpn { .. } => "/msgVpns".to_string(),
            Self::CreateRequestQueue { vpn, .. } | Self::CreateReplyQueue { vpn, .. } => {
                format!("/msgVpns/{}/queues", segment(vpn))
            }
            Self::CreateSubscription { vpn, queue, .. } => format!(
                "/msgVpns/{}/queues/{}/subscriptions",
                segment(vpn),
                segment(queue)
            ),
        }
    }

    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::CreateVpn { vpn } => to_value(MsgVpnRequest::new(vpn.as_str())),
            Self::CreateRequestQueue { queue, .. } | Self::CreateReplyQueue { queue, .. } => {
                to_value(QueueRequest::new(queue.as_str()))
            }
            Self::CreateSubscription { vpn, queue, topic } => to_value(SubscriptionRequest {
                msg_vpn_name: vpn.clone(),
                queue_name: queue.clone(),
                subscription_topic: topic.clone(),
            }),
        }
    }

    /// Short name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateVpn { .. } => "create_vpn",
            Self::CreateRequestQueue { .. } => "create_request_queue",
            Self::CreateReplyQueue { .. } => "create_reply_queue",
            Self::CreateSubscription { .. } => "create_subscription",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Self::CreateVpn { .. } => "VPN created successfully",
            Self::CreateRequestQueue { .. } => "Request Queue created successfully",
            Self::CreateReplyQueue { .. } => "Reply Queue created successfully",
            Self::CreateSubscription { .. } => "Subscription created successfully.",
        }
    }

    fn error_message(&self) -> &'static str {
        match self {
            Self::CreateVpn { .. } => "Error creating VPN:",
            Self::CreateRequestQueue { .. } => "Error creating Request Queue:",
            Self::CreateReplyQueue { .. } => "Error creating Reply Queue:",
            Self::CreateSubscription { .. } => "Error creating subscription:",
        }
    }
}

fn to_value<T: Serialize>(payload: T) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(payload)
}

// 名称里可能包含 '/' 或 '#'，必须编码成单个路径段
fn segment(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// 步骤结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Non-2xx answer; `body` is the response body verbatim.
    Rejected { status: u16, body: String },
    /// No HTTP answer at all.
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: ProvisioningStep,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        self.outcome == StepOutcome::Success
    }

    /// Text to show the operator for a failed step, `None` on success.
    pub fn diagnostic(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Success => None,
            StepOutcome::Rejected { body, .. } => Some(body),
            StepOutcome::Transport(msg) => Some(msg),
        }
    }
}

/// Success: one line. Failure: the error line, then the diagnostic text.
impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnostic() {
            None => write!(f, "{}", self.step.success_message()),
            Some(diag) => write!(f, "{}\n{}", self.step.error_message(), diag),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub steps: Vec<StepReport>,
}

impl ProvisioningReport {
    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

pub struct Provisioner<'a, A: ManagementApi + ?Sized> {
    api: &'a A,
    settings: &'a ConnectionSettings,
}

impl<'a, A: ManagementApi + ?Sized> Provisioner<'a, A> {
    pub fn new(api: &'a A, settings: &'a ConnectionSettings) -> Self {
        Self { api, settings }
    }

    /// 固定顺序：VPN -> 请求队列 -> 回复队列 -> 每个队列一个订阅
    pub fn plan(&self) -> Vec<ProvisioningStep> {
        let s = self.settings;
        let mut steps = vec![
            ProvisioningStep::CreateVpn {
                vpn: s.vpn_name.clone(),
            },
            ProvisioningStep::CreateRequestQueue {
                vpn: s.vpn_name.clone(),
                queue: s.request_queue_name.clone(),
            },
            ProvisioningStep::CreateReplyQueue {
                vpn: s.vpn_name.clone(),
                queue: s.reply_queue_name.clone(),
            },
        ];
        for queue in [&s.request_queue_name, &s.reply_queue_name] {
            steps.push(ProvisioningStep::CreateSubscription {
                vpn: s.vpn_name.clone(),
                queue: queue.clone(),
                topic: s.topic_name.clone(),
            });
        }
        steps
    }

    pub async fn run(&self) -> ProvisioningReport {
        self.run_with(|_| {}).await
    }

    /// Runs every step in order, handing each report to `on_step` as soon
    /// as that step finishes.
    pub async fn run_with<F>(&self, mut on_step: F) -> ProvisioningReport
    where
        F: FnMut(&StepReport),
    {
        let mut report = ProvisioningReport::default();
        for step in self.plan() {
            let outcome = self.execute(&step).await;
            let step_report = StepReport { step, outcome };
            on_step(&step_report);
            report.steps.push(step_report);
        }
        report
    }

    async fn execute(&self, step: &ProvisioningStep) -> StepOutcome {
        let path = step.path();
        let body = match step.payload() {
            Ok(body) => body,
            Err(e) => return StepOutcome::Transport(format!("failed to encode payload: {}", e)),
        };
        tracing::debug!(step = step.name(), %path, %body, "Sending request");

        match self.api.post_json(&path, &body).await {
            Ok(resp) if resp.is_success() => {
                tracing::info!(step = step.name(), %path, status = resp.status, "✅ Step succeeded");
                StepOutcome::Success
            }
            Ok(resp) => {
                let description = resp
                    .semp_error()
                    .and_then(|e| e.description)
                    .unwrap_or_default();
                tracing::warn!(
                    step = step.name(),
                    %path,
                    status = resp.status,
                    %description,
                    "❌ Step rejected by management API"
                );
                StepOutcome::Rejected {
                    status: resp.status,
                    body: resp.body,
                }
            }
            Err(Error::Transport(msg)) => {
                tracing::warn!(step = step.name(), %path, error = %msg, "❌ Step failed: transport error");
                StepOutcome::Transport(msg)
            }
            Err(e) => {
                tracing::warn!(step = step.name(), %path, error = %e, "❌ Step failed");
                StepOutcome::Transport(e.to_string())
            }
        }
    }
}
