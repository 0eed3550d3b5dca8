use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// 顶层应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub semp: ConnectionSettings,
}

// ============= SEMP 连接配置 =============

/// Everything needed to reach the management API and name the resources
/// to create. Loaded once and read-only for the rest of the run.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// e.g. `http://broker:8080/SEMP/v2/config`, stored without a trailing `/`
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub vpn_name: String,
    pub request_queue_name: String,
    pub reply_queue_name: String,
    pub topic_name: String,
    /// 未设置时使用 HTTP 客户端的默认行为（不设超时）
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"********")
            .field("vpn_name", &self.vpn_name)
            .field("request_queue_name", &self.request_queue_name)
            .field("reply_queue_name", &self.reply_queue_name)
            .field("topic_name", &self.topic_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 用于解析 TOML 的临时结构
#[derive(Deserialize)]
struct AppConfigFile {
    /// [semp] 表
    semp: SempSettingsFile,
}

/// appsettings.json 布局：`ConfigurationStrings` 节
#[derive(Deserialize)]
struct AppSettingsJson {
    #[serde(rename = "ConfigurationStrings")]
    configuration_strings: SempSettingsFile,
}

/// Shared by both file layouts: snake_case keys in TOML, PascalCase in
/// appsettings.json.
#[derive(Deserialize)]
struct SempSettingsFile {
    #[serde(alias = "BaseUrl")]
    base_url: String,
    #[serde(alias = "Username")]
    username: String,
    #[serde(alias = "Password")]
    password: String,
    #[serde(alias = "VpnName")]
    vpn_name: String,
    #[serde(alias = "RequestQueueName")]
    request_queue_name: String,
    #[serde(alias = "ReplyQueueName")]
    reply_queue_name: String,
    #[serde(alias = "TopicName")]
    topic_name: String,
    #[serde(default, alias = "TimeoutSecs")]
    timeout_secs: Option<u64>,
}

impl From<SempSettingsFile> for ConnectionSettings {
    fn from(t: SempSettingsFile) -> Self {
        ConnectionSettings {
            base_url: normalize_base_url(t.base_url),
            username: t.username,
            password: t.password,
            vpn_name: t.vpn_name,
            request_queue_name: t.request_queue_name,
            reply_queue_name: t.reply_queue_name,
            topic_name: t.topic_name,
            timeout: t.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

// ============= 环境变量覆盖 =============

pub const ENV_BASE_URL: &str = "SEMP_BASE_URL";
pub const ENV_USERNAME: &str = "SEMP_USERNAME";
pub const ENV_PASSWORD: &str = "SEMP_PASSWORD";
pub const ENV_VPN_NAME: &str = "SEMP_VPN_NAME";
pub const ENV_REQUEST_QUEUE: &str = "SEMP_REQUEST_QUEUE";
pub const ENV_REPLY_QUEUE: &str = "SEMP_REPLY_QUEUE";
pub const ENV_TOPIC: &str = "SEMP_TOPIC";

impl AppConfig {
    /// Overrides file values with `SEMP_*` variables from the process environment.
    /// A variable that is set but empty (`SEMP_PASSWORD=`) is ignored and the
    /// file value is kept.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::apply_env_overrides`] with an explicit lookup.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = &mut self.semp;
        let fields: [(&str, &mut String); 7] = [
            (ENV_BASE_URL, &mut s.base_url),
            (ENV_USERNAME, &mut s.username),
            (ENV_PASSWORD, &mut s.password),
            (ENV_VPN_NAME, &mut s.vpn_name),
            (ENV_REQUEST_QUEUE, &mut s.request_queue_name),
            (ENV_REPLY_QUEUE, &mut s.reply_queue_name),
            (ENV_TOPIC, &mut s.topic_name),
        ];
        for (key, slot) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                tracing::debug!(key, "config value overridden from environment");
                *slot = value;
            }
        }
        s.base_url = normalize_base_url(std::mem::take(&mut s.base_url));
        self
    }
}

// ============= 配置加载函数 =============

/// 从 TOML 字符串加载应用配置
pub fn load_config_from_toml_str(s: &str) -> Result<AppConfig> {
    let parsed: AppConfigFile = toml::from_str(s)?;
    Ok(AppConfig {
        semp: ConnectionSettings::from(parsed.semp),
    })
}

/// 从 appsettings.json 布局加载（`ConfigurationStrings` 节）
pub fn load_config_from_json_str(s: &str) -> Result<AppConfig> {
    let parsed: AppSettingsJson = serde_json::from_str(s)?;
    Ok(AppConfig {
        semp: ConnectionSettings::from(parsed.configuration_strings),
    })
}

/// Reads a config file; `.json` selects the appsettings layout, anything else is TOML.
pub fn load_config_from_path(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    tracing::info!(path = %path.display(), json = is_json, "Loading configuration");

    if is_json {
        load_config_from_json_str(&contents)
    } else {
        load_config_from_toml_str(&contents)
    }
}
