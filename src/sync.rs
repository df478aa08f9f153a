//! 同步流程
//!
//! 关闭门户 → 设置上行 DNS → 连接上行 WiFi（有限次重试）→ 逐条上传 → 清空队列。
//! 连接失败是唯一保留队列的情况；单条上传失败只记录日志，不重试，也不中断后续上传。

use crate::boards::{Board, Uploader};
use crate::captive_portal::CaptivePortal;
use crate::config::{KioskConfig, WipePolicy};
use crate::error::{KioskError, Result};
use crate::queue::{MessageQueue, QueueLines};
use crate::record::Record;

/// 一次同步的结果，仅用于日志和测试
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub joined: bool,
    pub join_attempts: u32,
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub wiped: bool,
    pub retained: usize,
}

pub struct SyncEngine<'a, B: Board, U: Uploader> {
    board: &'a mut B,
    uploader: &'a mut U,
    config: &'a KioskConfig,
}

impl<'a, B: Board, U: Uploader> SyncEngine<'a, B, U> {
    pub fn new(board: &'a mut B, uploader: &'a mut U, config: &'a KioskConfig) -> Self {
        Self {
            board,
            uploader,
            config,
        }
    }

    /// 执行一次完整同步。门户在这里被关闭，之后才读取队列
    pub fn run(mut self, portal: CaptivePortal<B::Dns, B::Http>) -> SyncReport {
        log::info!("[SYNC] Stopping Portal...");
        let queue = portal.shutdown(&mut *self.board);

        let mut report = SyncReport::default();

        if let Err(e) = self.board.configure_uplink_dns(&self.config.uplink.dns) {
            log::warn!("[SYNC] failed to configure uplink DNS: {:?}", e);
        }

        match self.join() {
            Ok(attempts) => {
                report.joined = true;
                report.join_attempts = attempts;
            }
            Err(e) => {
                if let KioskError::NetworkJoinTimeout { attempts } = e {
                    report.join_attempts = attempts;
                }
                log::error!("[SYNC] {}. Check Password? Queue kept for the next sync.", e);
                return report;
            }
        }

        log::info!("[SYNC] Connected! Reading data...");
        let mut lines = queue.read_all();
        let failed_lines = self.drain(&mut lines, &mut report);
        if lines.aborted() {
            log::error!("[SYNC] queue storage unreadable, keeping it for the next sync");
        } else {
            self.wipe(&queue, failed_lines, &mut report);
        }

        log::info!(
            "[SYNC] done: {} uploaded, {} failed, {} skipped",
            report.uploaded,
            report.failed,
            report.skipped
        );
        report
    }

    /// 轮询连接状态，返回等待次数
    fn join(&mut self) -> Result<u32> {
        let config = self.config;
        let uplink = &config.uplink;
        log::info!("[SYNC] Connecting to {:?}", uplink.ssid);
        if let Err(e) = self.board.begin_join(uplink) {
            log::error!("[SYNC] failed to start join: {:?}", e);
        }

        let mut attempts = 0;
        while !self.board.is_joined() {
            if attempts >= uplink.join_attempts {
                return Err(KioskError::NetworkJoinTimeout { attempts });
            }
            self.board.delay(uplink.join_poll_interval());
            attempts += 1;
        }
        Ok(attempts)
    }

    /// 逐条上传，返回上传失败的原始行
    fn drain(&mut self, lines: &mut QueueLines, report: &mut SyncReport) -> Vec<String> {
        let url = self.config.endpoint.url();
        let mut failed_lines = Vec::new();
        let mut lines = lines.peekable();

        if lines.peek().is_none() {
            log::info!("[SYNC] No data to upload.");
        }

        for line in lines {
            let Some(record) = Record::parse_line(&line) else {
                log::warn!("[SYNC] skipping malformed line {:?}", line);
                report.skipped += 1;
                continue;
            };

            match self.upload(&url, &record) {
                Ok(status) => {
                    log::info!("[SYNC] Uploaded! HTTP Code: {}", status);
                    report.uploaded += 1;
                }
                Err(e) => {
                    log::error!("[SYNC] Failed. {}", e);
                    report.failed += 1;
                    failed_lines.push(line);
                }
            }
        }
        failed_lines
    }

    fn upload(&mut self, url: &str, record: &Record) -> Result<u16> {
        let body = record
            .to_json()
            .map_err(|e| KioskError::UploadFailure(format!("serialize: {}", e)))?;
        let status = self
            .uploader
            .post_json(url, &body)
            .map_err(|e| KioskError::UploadFailure(format!("{:?}", e)))?;
        // Apps Script 处理完 POST 后以 302 跳转返回结果
        if (200..400).contains(&status) {
            Ok(status)
        } else {
            Err(KioskError::UploadFailure(format!("HTTP {}", status)))
        }
    }

    fn wipe(&mut self, queue: &MessageQueue, failed_lines: Vec<String>, report: &mut SyncReport) {
        let result = match self.config.sync.wipe_policy {
            WipePolicy::Unconditional => queue.clear(),
            WipePolicy::RetainFailed => {
                report.retained = failed_lines.len();
                queue.retain(&failed_lines)
            }
        };

        match result {
            Ok(()) => {
                report.wiped = true;
                log::info!("[SYNC] Data wiped from chip.");
            }
            Err(e) => log::error!("[SYNC] failed to wipe queue: {}", e),
        }
    }
}
