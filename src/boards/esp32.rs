//! ESP32 板级实现
//!
//! WiFi 驱动在热点和上行之间共用；门户 HTTP 服务跑在 esp-idf 的 httpd 任务里，
//! 请求通过 channel 转交给主循环处理，保证队列只在主循环中写入。

use std::ffi::CStr;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::anyhow;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{
        gpio::{AnyIOPin, Input, PinDriver, Pull},
        modem::Modem,
    },
    http::{
        client::{Configuration as HttpClientConfig, EspHttpConnection as HttpClientConnection},
        server::{Configuration as HttpServerConfig, EspHttpConnection, EspHttpServer, Request},
        Method, Query,
    },
    io::{Read, Write},
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration, NetifStack},
    nvs::EspDefaultNvsPartition,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration,
        Configuration as WifiConfig, EspWifi, WifiDriver,
    },
};

use super::{Board, HttpService, PortalRequest, PortalResponse, Uploader};
use crate::captive_portal::CaptiveDns;
use crate::config::{ApConfig, UplinkConfig};

const HTTP_STACK_SIZE: usize = 8192;
const MAX_FORM_BODY: usize = 4096;
/// httpd 任务等待主循环回复的最长时间
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// 挂载 SPIFFS 存储分区，门户页面和队列文件都在这里
pub fn mount_storage(base_path: &'static CStr, partition_label: &'static CStr) -> anyhow::Result<()> {
    let conf = esp_idf_svc::sys::esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: partition_label.as_ptr(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    esp_idf_svc::sys::esp!(unsafe { esp_idf_svc::sys::esp_vfs_spiffs_register(&conf) })?;
    Ok(())
}

pub struct Esp32Board {
    wifi: BlockingWifi<EspWifi<'static>>,
    button: PinDriver<'static, AnyIOPin, Input>,
    uplink_dns: Vec<Ipv4Addr>,
    dns_applied: bool,
}

impl Esp32Board {
    pub fn new(
        modem: Modem,
        button: AnyIOPin,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        ap: &ApConfig,
    ) -> anyhow::Result<Self> {
        // 热点网络接口使用固定 IP，并把 DHCP 下发的 DNS 指向自己
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: ap.ip,
                    mask: Mask(ap.prefix_len),
                },
                dhcp_enabled: true,
                dns: Some(ap.ip),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };
        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;

        let driver = WifiDriver::new(modem, sysloop.clone(), nvs)?;
        let sta_netif = EspNetif::new(NetifStack::Sta)?;

        let wifi = BlockingWifi::wrap(
            EspWifi::wrap_all(driver, sta_netif, ap_netif)?,
            sysloop,
        )?;

        let mut button = PinDriver::input(button)?;
        button.set_pull(Pull::Up)?;

        Ok(Self {
            wifi,
            button,
            uplink_dns: Vec::new(),
            dns_applied: false,
        })
    }

    fn apply_uplink_dns(&mut self) {
        let netif = self.wifi.wifi_mut().sta_netif_mut();
        if let Some(primary) = self.uplink_dns.first() {
            netif.set_dns(*primary);
        }
        if let Some(secondary) = self.uplink_dns.get(1) {
            netif.set_secondary_dns(*secondary);
        }
        log::info!("Uplink DNS set to {:?}", self.uplink_dns);
        self.dns_applied = true;
    }
}

impl Board for Esp32Board {
    type Dns = CaptiveDns;
    type Http = EspPortalHttp;

    fn start_access_point(&mut self, ap: &ApConfig) -> anyhow::Result<(CaptiveDns, EspPortalHttp)> {
        let ap_config = AccessPointConfiguration {
            ssid: ap
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("SSID {:?} too long", ap.ssid))?,
            ssid_hidden: false,
            channel: ap.channel,
            auth_method: AuthMethod::None,
            max_connections: ap.max_connections,
            ..Default::default()
        };

        self.wifi.set_configuration(&WifiConfig::AccessPoint(ap_config))?;
        self.wifi.start()?;

        let dns = CaptiveDns::bind(
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ap.dns_port)),
            ap.ip,
        )?;
        let http = EspPortalHttp::start(ap.http_port)?;
        Ok((dns, http))
    }

    fn stop_access_point(&mut self) -> anyhow::Result<()> {
        self.wifi.stop()?;
        log::info!("SoftAP stopped");
        Ok(())
    }

    fn configure_uplink_dns(&mut self, servers: &[Ipv4Addr]) -> anyhow::Result<()> {
        // DHCP 完成后才能覆盖，真正写入在 is_joined 中
        self.uplink_dns = servers.to_vec();
        self.dns_applied = false;
        Ok(())
    }

    fn begin_join(&mut self, uplink: &UplinkConfig) -> anyhow::Result<()> {
        let auth_method = if uplink.pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: uplink
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("SSID {:?} too long", uplink.ssid))?,
            password: uplink
                .pass
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("WiFi password too long"))?,
            auth_method,
            ..Default::default()
        };

        self.wifi.set_configuration(&WifiConfig::Client(client))?;
        self.wifi.start()?;
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn is_joined(&mut self) -> bool {
        let up = self.wifi.is_up().unwrap_or(false);
        if up && !self.dns_applied {
            self.apply_uplink_dns();
        }
        up
    }

    fn trigger_asserted(&mut self) -> bool {
        self.button.is_low()
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn restart(&mut self) {
        unsafe { esp_idf_svc::sys::esp_restart() }
    }
}

type Reply = mpsc::SyncSender<PortalResponse>;

/// httpd 任务与主循环之间的桥
pub struct EspPortalHttp {
    // 先于 server 释放：挂起的 handler 会因回复通道断开而立即返回
    rx: mpsc::Receiver<(PortalRequest, Reply)>,
    _server: EspHttpServer<'static>,
}

impl EspPortalHttp {
    fn start(port: u16) -> anyhow::Result<Self> {
        let config = HttpServerConfig {
            http_port: port,
            stack_size: HTTP_STACK_SIZE,
            uri_match_wildcard: true,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&config)?;
        let (tx, rx) = mpsc::channel();

        for method in [Method::Get, Method::Post] {
            let tx = tx.clone();
            server.fn_handler::<anyhow::Error, _>("/*", method, move |req| forward(req, &tx))?;
        }
        log::info!("HTTP server started on port {}", port);

        Ok(Self {
            rx,
            _server: server,
        })
    }
}

impl HttpService for EspPortalHttp {
    fn poll(
        &mut self,
        handler: &mut dyn FnMut(&PortalRequest) -> PortalResponse,
    ) -> anyhow::Result<bool> {
        match self.rx.try_recv() {
            Ok((req, reply)) => {
                let resp = handler(&req);
                if reply.send(resp).is_err() {
                    log::warn!("HTTP client went away before reply");
                }
                Ok(true)
            }
            Err(mpsc::TryRecvError::Empty) => Ok(false),
            Err(mpsc::TryRecvError::Disconnected) => Err(anyhow!("HTTP server stopped")),
        }
    }
}

fn forward(
    mut req: Request<&mut EspHttpConnection<'_>>,
    tx: &mpsc::Sender<(PortalRequest, Reply)>,
) -> anyhow::Result<()> {
    let method = match req.method() {
        Method::Post => http::Method::POST,
        _ => http::Method::GET,
    };
    let uri = req.uri().to_string();

    let mut body = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = req.read(&mut buf)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
        if body.len() > MAX_FORM_BODY {
            log::warn!("Request body over {} bytes truncated", MAX_FORM_BODY);
            break;
        }
    }

    let request = http::Request::builder().method(method).uri(uri).body(body)?;
    let (reply_tx, reply_rx) = mpsc::sync_channel(1);
    tx.send((request, reply_tx))
        .map_err(|_| anyhow!("portal closed"))?;
    let resp = reply_rx.recv_timeout(REPLY_TIMEOUT)?;

    let content_type = resp
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain");
    let mut out = req.into_response(
        resp.status().as_u16(),
        None,
        &[("Content-Type", content_type)],
    )?;
    out.write_all(resp.body())?;
    Ok(())
}

/// 通过 esp-idf HTTP 客户端上传（使用内置证书包校验 HTTPS）
pub struct EspUploader {
    timeout: Duration,
}

impl EspUploader {
    pub fn new() -> Self {
        Self {
            timeout: UPLOAD_TIMEOUT,
        }
    }
}

impl Default for EspUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl Uploader for EspUploader {
    fn post_json(&mut self, url: &str, body: &str) -> anyhow::Result<u16> {
        // 默认只对 GET/HEAD 跟随跳转
        let config = HttpClientConfig {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = HttpClientConnection::new(&config)?;

        let content_length = body.len().to_string();
        conn.initiate_request(
            Method::Post,
            url,
            &[
                ("Content-Type", "application/json"),
                ("Content-Length", &content_length),
            ],
        )?;
        conn.write_all(body.as_bytes())?;
        conn.initiate_response()?;

        let status = conn.status();

        let mut buf = [0u8; 256];
        let mut response_len = 0;
        loop {
            match conn.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => response_len += n,
                Err(e) => {
                    log::warn!("[SYNC] failed to read response: {:?}", e);
                    break;
                }
            }
        }
        log::debug!("[SYNC] response {} ({} bytes)", status, response_len);

        Ok(status)
    }
}
