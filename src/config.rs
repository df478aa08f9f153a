//! Kiosk 配置
//!
//! 默认值在编译期通过环境变量注入（`KIOSK_*`），存储分区上的 `kiosk.json`
//! 可以覆盖其中任意字段。

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

static AP_SSID: Option<&str> = option_env!("KIOSK_AP_SSID");
static UPLINK_SSID: Option<&str> = option_env!("KIOSK_UPLINK_SSID");
static UPLINK_PASS: Option<&str> = option_env!("KIOSK_UPLINK_PASS");
static SYNC_HOST: Option<&str> = option_env!("KIOSK_SYNC_HOST");
static SCRIPT_ID: Option<&str> = option_env!("KIOSK_SCRIPT_ID");

pub const CONFIG_FILE: &str = "kiosk.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub ap: ApConfig,
    pub uplink: UplinkConfig,
    pub endpoint: EndpointConfig,
    pub storage: StorageConfig,
    pub trigger: TriggerConfig,
    pub sync: SyncConfig,
}

/// 热点配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApConfig {
    pub ssid: String,
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
    pub channel: u8,
    pub max_connections: u16,
    pub dns_port: u16,
    pub http_port: u16,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            ssid: AP_SSID.unwrap_or("laPasion WiFi").to_string(),
            ip: Ipv4Addr::new(192, 168, 1, 1),
            prefix_len: 24,
            channel: 1,
            max_connections: 4,
            dns_port: 53,
            http_port: 80,
        }
    }
}

/// 上行 WiFi 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    pub ssid: String,
    pub pass: String,
    pub dns: Vec<Ipv4Addr>,
    pub join_attempts: u32,
    pub join_poll_ms: u64,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            ssid: UPLINK_SSID.unwrap_or_default().to_string(),
            pass: UPLINK_PASS.unwrap_or_default().to_string(),
            dns: vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)],
            join_attempts: 30,
            join_poll_ms: 500,
        }
    }
}

impl UplinkConfig {
    pub fn join_poll_interval(&self) -> Duration {
        Duration::from_millis(self.join_poll_ms)
    }
}

/// 远端上传地址：`https://<host>/<script_id>/exec`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub script_id: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: SYNC_HOST.unwrap_or("script.google.com/macros/s").to_string(),
            script_id: SCRIPT_ID.unwrap_or_default().to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn url(&self) -> String {
        format!(
            "https://{}/{}/exec",
            self.host.trim_matches('/'),
            self.script_id.trim_matches('/')
        )
    }
}

/// 存储分区上的文件布局
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub queue_file: String,
    pub landing_asset: String,
    pub confirmation_asset: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/storage"),
            queue_file: "responses.txt".to_string(),
            landing_asset: "index.html".to_string(),
            confirmation_asset: "thanks.html".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn queue_path(&self) -> PathBuf {
        self.root.join(&self.queue_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub settle_ms: u64,
    /// 门户主循环空闲时每轮休眠的时间，让出 CPU 给 IDLE 任务
    pub idle_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            idle_ms: 10,
        }
    }
}

/// 同步结束后如何处理队列
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipePolicy {
    /// 无论上传结果如何都清空队列
    #[default]
    Unconditional,
    /// 保留上传失败的记录，下次同步重试
    RetainFailed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub wipe_policy: WipePolicy,
    pub restart_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            wipe_policy: WipePolicy::Unconditional,
            restart_delay_ms: 2000,
        }
    }
}

impl KioskConfig {
    /// 读取 `<root>/kiosk.json`，不存在或解析失败时使用编译期默认值
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<KioskConfig>(&s) {
                Ok(c) => {
                    log::info!("Loaded config overrides from {:?}", path);
                    c
                }
                Err(e) => {
                    log::error!("Failed to parse {:?}: {}", path, e);
                    KioskConfig::default()
                }
            },
            Err(_) => KioskConfig::default(),
        };
        config.storage.root = root.to_path_buf();
        config
    }
}
