//! 板级抽象
//!
//! 状态机只通过这里的 trait 访问硬件：WiFi（热点 / 上行）、按键、延时、重启、
//! 以及门户阶段的 DNS / HTTP 服务。ESP32 实现位于 `esp32`，测试使用 `mock`。

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::config::{ApConfig, UplinkConfig};

#[cfg(target_os = "espidf")]
pub mod esp32;

#[cfg(test)]
pub(crate) mod mock;

pub type PortalRequest = http::Request<Vec<u8>>;
pub type PortalResponse = http::Response<Vec<u8>>;

/// 门户 DNS 服务，每次调用最多处理一个查询，不阻塞
pub trait DnsService {
    fn poll(&mut self) -> anyhow::Result<bool>;
}

/// 门户 HTTP 服务，每次调用最多处理一个请求，不阻塞
pub trait HttpService {
    fn poll(
        &mut self,
        handler: &mut dyn FnMut(&PortalRequest) -> PortalResponse,
    ) -> anyhow::Result<bool>;
}

pub trait Board {
    type Dns: DnsService;
    type Http: HttpService;

    /// 启动热点，并返回绑定在热点地址上的 DNS / HTTP 服务
    fn start_access_point(&mut self, ap: &ApConfig) -> anyhow::Result<(Self::Dns, Self::Http)>;

    fn stop_access_point(&mut self) -> anyhow::Result<()>;

    /// 设置上行网络使用的 DNS 服务器
    fn configure_uplink_dns(&mut self, servers: &[Ipv4Addr]) -> anyhow::Result<()>;

    /// 开始连接上行 WiFi，不等待结果
    fn begin_join(&mut self, uplink: &UplinkConfig) -> anyhow::Result<()>;

    fn is_joined(&mut self) -> bool;

    /// 采样触发按键（低电平有效）
    fn trigger_asserted(&mut self) -> bool;

    fn delay(&mut self, duration: Duration);

    /// 重启设备。真机上不会返回；测试中返回后由调用方重新进入门户模式
    fn restart(&mut self);
}

/// HTTPS JSON 上传
pub trait Uploader {
    /// POST `body`（`application/json`）到 `url`，返回 HTTP 状态码
    fn post_json(&mut self, url: &str, body: &str) -> anyhow::Result<u16>;
}
