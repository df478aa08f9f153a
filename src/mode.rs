//! 顶层状态机
//!
//! PORTAL（初始）：每轮各处理一个 DNS 查询、一个 HTTP 请求，并采样一次按键。
//! SYNCING（过渡）：由消抖后的按键触发，总是以重启结束，重启后回到 PORTAL。

use std::time::Duration;

use crate::boards::{Board, Uploader};
use crate::captive_portal::CaptivePortal;
use crate::config::KioskConfig;
use crate::queue::MessageQueue;
use crate::sync::{SyncEngine, SyncReport};
use crate::trigger::Debouncer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Portal,
    Syncing,
}

pub struct ModeController<B: Board, U: Uploader> {
    board: B,
    uploader: U,
    config: KioskConfig,
    debouncer: Debouncer,
    mode: Mode,
}

impl<B: Board, U: Uploader> ModeController<B, U> {
    pub fn new(board: B, uploader: U, config: KioskConfig) -> Self {
        let debouncer = Debouncer::new(Duration::from_millis(config.trigger.settle_ms));
        Self {
            board,
            uploader,
            config,
            debouncer,
            mode: Mode::Portal,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// 运行一个完整周期：门户 → 触发 → 同步 → 重启
    ///
    /// 真机上 `Board::restart` 不会返回；若返回（测试或无法重启的环境），
    /// 状态重置为 PORTAL，再次调用即重新进入门户。
    pub fn run(&mut self) -> anyhow::Result<SyncReport> {
        self.mode = Mode::Portal;
        let queue = MessageQueue::new(self.config.storage.queue_path());
        let mut portal = CaptivePortal::start(&mut self.board, &self.config, queue)?;
        log::info!("System Ready. Press BOOT button to Sync.");

        let idle = Duration::from_millis(self.config.trigger.idle_ms);
        loop {
            let busy = portal.poll();
            if self.debouncer.confirm(&mut self.board) {
                break;
            }
            if !busy {
                self.board.delay(idle);
            }
        }

        log::info!("[SYNC] Trigger confirmed");
        self.mode = Mode::Syncing;
        let report =
            SyncEngine::new(&mut self.board, &mut self.uploader, &self.config).run(portal);
        log::info!("[SYNC] {:?}", report);

        log::info!("[SYNC] Restarting Portal...");
        self.board
            .delay(Duration::from_millis(self.config.sync.restart_delay_ms));
        self.board.restart();

        self.mode = Mode::Portal;
        Ok(report)
    }
}
