//! 触发按键消抖
//!
//! 采样一次，若有效则等待稳定时间后再采样一次，两次都有效才算触发。

use std::time::Duration;

use crate::boards::Board;

/// 可采样、可等待的触发源
pub trait TriggerSource {
    fn sample(&mut self) -> bool;
    fn wait(&mut self, duration: Duration);
}

impl<B: Board> TriggerSource for B {
    fn sample(&mut self) -> bool {
        self.trigger_asserted()
    }

    fn wait(&mut self, duration: Duration) {
        self.delay(duration)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    settle: Duration,
}

impl Debouncer {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// 双采样确认一次触发
    pub fn confirm<T: TriggerSource + ?Sized>(&self, source: &mut T) -> bool {
        if !source.sample() {
            return false;
        }
        source.wait(self.settle);
        let confirmed = source.sample();
        if !confirmed {
            log::debug!("Trigger noise rejected");
        }
        confirmed
    }
}
