use anyhow::{Context, Result};
use clap::Parser;
use semp_provisioner_core::{
    backends::{mock::MockApi, semp_http::SempHttpClient},
    config::{load_config_from_path, AppConfig},
    run_provisioner,
    traits::ManagementApi,
};
use std::path::{Path, PathBuf};

const DEFAULT_JSON_CONFIG: &str = "appsettings.json";
const DEFAULT_TOML_CONFIG: &str = "semp-provisioner.toml";

/// Provision a Message VPN, a request/reply queue pair and their topic
/// subscriptions through the broker's SEMP v2 management API.
#[derive(Parser, Debug)]
#[command(name = "semp-provisioner")]
struct Args {
    /// Config file (`.json` = appsettings layout, otherwise TOML)
    #[arg(short, long, env = "SEMP_PROVISIONER_CONFIG")]
    config: Option<PathBuf>,

    /// Log every request instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Exit with status 1 if any step failed
    #[arg(long)]
    fail_on_error: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 初始化日志（这是入口点的职责），日志写 stderr，步骤报告写 stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // 2. 加载配置；配置错误时在发出任何请求之前退出
    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    // 3. 选择后端并执行配置流程
    let all_succeeded = if args.dry_run {
        tracing::info!("💿 Dry run: requests are logged, nothing is sent");
        provision(&MockApi::new(), &config).await
    } else {
        let client = match SempHttpClient::new(&config.semp) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("❌ Failed to create HTTP client: {}", e);
                std::process::exit(1);
            }
        };
        provision(&client, &config).await
    };

    let code = exit_code(args.fail_on_error, all_succeeded);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// 默认跑完即返回 0；只有 `--fail-on-error` 且有步骤失败时返回 1
fn exit_code(fail_on_error: bool, all_succeeded: bool) -> i32 {
    if fail_on_error && !all_succeeded { 1 } else { 0 }
}

fn load(args: &Args) -> Result<AppConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path(Path::new("."))?,
    };
    let config = load_config_from_path(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Ok(config.apply_env_overrides())
}

/// `appsettings.json` wins over `semp-provisioner.toml` when both exist in `dir`.
fn default_config_path(dir: &Path) -> Result<PathBuf> {
    [DEFAULT_JSON_CONFIG, DEFAULT_TOML_CONFIG]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
        .with_context(|| {
            format!(
                "no --config given and neither {} nor {} found in {}",
                DEFAULT_JSON_CONFIG,
                DEFAULT_TOML_CONFIG,
                dir.display()
            )
        })
}

/// 每个步骤一行（失败时附带诊断文本）写 stdout；汇总只进日志
async fn provision<A: ManagementApi>(api: &A, config: &AppConfig) -> bool {
    let report = run_provisioner(api, &config.semp, |step| println!("{}", step)).await;
    tracing::info!(
        "{} of {} steps succeeded",
        report.succeeded(),
        report.steps.len()
    );
    report.all_succeeded()
}
