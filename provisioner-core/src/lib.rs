//! Core library for the SEMP provisioner.
//! This crate defines the management-API trait, the request payloads,
//! the configuration loader and the provisioning sequence, and provides
//! an HTTP backend (SEMP v2) plus a recording mock backend.

pub mod backends;
pub mod config;
pub mod provisioner;
pub mod structs;
pub mod traits;

// Define a shared Error and Result type for the entire crate.

use thiserror::Error;

use config::ConnectionSettings;
use provisioner::{ProvisioningReport, Provisioner, StepReport};
use traits::ManagementApi;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// 未拿到任何 HTTP 响应（DNS、连接被拒、超时等）
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// 核心配置流程：按顺序创建 VPN、两个队列和两个订阅
///
/// Each finished step is handed to `on_step` right away. A failed step is
/// reported and the sequence moves on; the function itself never fails
/// because of a step.
pub async fn run_provisioner<A, F>(
    api: &A,
    settings: &ConnectionSettings,
    on_step: F,
) -> ProvisioningReport
where
    A: ManagementApi + ?Sized,
    F: FnMut(&StepReport),
{
    tracing::info!(
        base_url = %settings.base_url,
        vpn = %settings.vpn_name,
        "🚀 Starting provisioning sequence..."
    );

    let report = Provisioner::new(api, settings).run_with(on_step).await;

    if report.all_succeeded() {
        tracing::info!(steps = report.steps.len(), "✅ All provisioning steps succeeded");
    } else {
        tracing::warn!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "⚠️ Provisioning finished with failures"
        );
    }
    report
}
