//! 测试用的板级实现

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use super::{Board, DnsService, HttpService, PortalRequest, PortalResponse, Uploader};
use crate::config::{ApConfig, UplinkConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BoardEvent {
    ApStarted,
    DnsClosed,
    HttpClosed,
    ApStopped,
    UplinkDns(Vec<Ipv4Addr>),
    JoinBegun(String),
    Restart,
}

type EventLog = Rc<RefCell<Vec<BoardEvent>>>;

pub(crate) struct MockBoard {
    /// 按键采样序列，用完后保持按下
    pub trigger: VecDeque<bool>,
    /// 第几次查询连接状态时连上；`None` 表示永远连不上
    pub join_after: Option<u32>,
    /// 门户启动后依次收到的 HTTP 请求
    pub requests: VecDeque<PortalRequest>,
    pub responses: Rc<RefCell<Vec<PortalResponse>>>,
    pub events: EventLog,
    pub delays: Vec<Duration>,
    pub join_polls: u32,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            trigger: VecDeque::new(),
            join_after: Some(0),
            requests: VecDeque::new(),
            responses: Rc::default(),
            events: Rc::default(),
            delays: Vec::new(),
            join_polls: 0,
        }
    }

    pub fn events(&self) -> Vec<BoardEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, event: &BoardEvent) -> usize {
        self.events.borrow().iter().filter(|e| *e == event).count()
    }
}

pub(crate) struct MockDns {
    events: EventLog,
}

impl DnsService for MockDns {
    fn poll(&mut self) -> anyhow::Result<bool> {
        Ok(false)
    }
}

impl Drop for MockDns {
    fn drop(&mut self) {
        self.events.borrow_mut().push(BoardEvent::DnsClosed);
    }
}

pub(crate) struct MockHttp {
    requests: VecDeque<PortalRequest>,
    responses: Rc<RefCell<Vec<PortalResponse>>>,
    events: EventLog,
}

impl HttpService for MockHttp {
    fn poll(
        &mut self,
        handler: &mut dyn FnMut(&PortalRequest) -> PortalResponse,
    ) -> anyhow::Result<bool> {
        let Some(req) = self.requests.pop_front() else {
            return Ok(false);
        };
        let resp = handler(&req);
        self.responses.borrow_mut().push(resp);
        Ok(true)
    }
}

impl Drop for MockHttp {
    fn drop(&mut self) {
        self.events.borrow_mut().push(BoardEvent::HttpClosed);
    }
}

impl Board for MockBoard {
    type Dns = MockDns;
    type Http = MockHttp;

    fn start_access_point(&mut self, _ap: &ApConfig) -> anyhow::Result<(MockDns, MockHttp)> {
        self.events.borrow_mut().push(BoardEvent::ApStarted);
        let dns = MockDns {
            events: self.events.clone(),
        };
        let http = MockHttp {
            requests: std::mem::take(&mut self.requests),
            responses: self.responses.clone(),
            events: self.events.clone(),
        };
        Ok((dns, http))
    }

    fn stop_access_point(&mut self) -> anyhow::Result<()> {
        self.events.borrow_mut().push(BoardEvent::ApStopped);
        Ok(())
    }

    fn configure_uplink_dns(&mut self, servers: &[Ipv4Addr]) -> anyhow::Result<()> {
        self.events
            .borrow_mut()
            .push(BoardEvent::UplinkDns(servers.to_vec()));
        Ok(())
    }

    fn begin_join(&mut self, uplink: &UplinkConfig) -> anyhow::Result<()> {
        self.events
            .borrow_mut()
            .push(BoardEvent::JoinBegun(uplink.ssid.clone()));
        self.join_polls = 0;
        Ok(())
    }

    fn is_joined(&mut self) -> bool {
        let polls = self.join_polls;
        self.join_polls += 1;
        self.join_after.is_some_and(|n| polls >= n)
    }

    fn trigger_asserted(&mut self) -> bool {
        self.trigger.pop_front().unwrap_or(true)
    }

    fn delay(&mut self, duration: Duration) {
        self.delays.push(duration);
    }

    fn restart(&mut self) {
        self.events.borrow_mut().push(BoardEvent::Restart);
    }
}

#[derive(Default)]
pub(crate) struct MockUploader {
    /// 依次返回的结果，用完后返回 200
    pub results: VecDeque<anyhow::Result<u16>>,
    pub sent: Vec<(String, String)>,
}

impl Uploader for MockUploader {
    fn post_json(&mut self, url: &str, body: &str) -> anyhow::Result<u16> {
        self.sent.push((url.to_string(), body.to_string()));
        self.results.pop_front().unwrap_or(Ok(200))
    }
}
