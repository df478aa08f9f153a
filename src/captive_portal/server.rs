//! 热点门户生命周期

use super::handlers::{Assets, PortalHandler};
use crate::boards::{Board, DnsService, HttpService, PortalRequest};
use crate::config::KioskConfig;
use crate::queue::MessageQueue;

/// 运行中的门户
///
/// 门户存在期间独占队列的写入；`shutdown` 之后队列才会交给同步流程。
pub struct CaptivePortal<D, H> {
    dns: D,
    http: H,
    handler: PortalHandler,
}

impl<D: DnsService, H: HttpService> CaptivePortal<D, H> {
    pub fn start<B>(board: &mut B, config: &KioskConfig, queue: MessageQueue) -> anyhow::Result<Self>
    where
        B: Board<Dns = D, Http = H>,
    {
        let (dns, http) = board.start_access_point(&config.ap)?;
        log::info!(
            "[Portal] SoftAP {:?} up, portal at http://{}:{}",
            config.ap.ssid,
            config.ap.ip,
            config.ap.http_port
        );

        Ok(Self {
            dns,
            http,
            handler: PortalHandler::new(queue, Assets::new(&config.storage)),
        })
    }

    /// 处理最多一个 DNS 查询和一个 HTTP 请求，返回是否有工作完成
    pub fn poll(&mut self) -> bool {
        let dns = self.dns.poll().unwrap_or_else(|e| {
            log::warn!("[DNS] poll error: {:?}", e);
            false
        });

        let handler = &self.handler;
        let http = self
            .http
            .poll(&mut |req: &PortalRequest| handler.handle(req))
            .unwrap_or_else(|e| {
                log::warn!("[Portal] HTTP poll error: {:?}", e);
                false
            });

        dns || http
    }

    /// 停止 DNS / HTTP 服务并关闭热点，交还队列
    pub fn shutdown<B>(self, board: &mut B) -> MessageQueue
    where
        B: Board<Dns = D, Http = H>,
    {
        let Self { dns, http, handler } = self;
        drop(http);
        drop(dns);
        if let Err(e) = board.stop_access_point() {
            log::error!("[Portal] failed to stop SoftAP: {:?}", e);
        }
        handler.into_queue()
    }
}
