//! 离线留言亭
//!
//! 平时作为开放热点运行留言门户，把提交的内容写入本地队列；按下 BOOT 键后
//! 切换到上行 WiFi，把队列逐条上传到远端并清空，然后重启回到门户模式。

pub mod boards;
pub mod captive_portal;
pub mod config;
pub mod error;
pub mod mode;
pub mod queue;
pub mod record;
pub mod sync;
pub mod trigger;

pub use config::KioskConfig;
pub use error::KioskError;
pub use mode::{Mode, ModeController};
pub use queue::MessageQueue;
pub use record::Record;
pub use sync::{SyncEngine, SyncReport};
