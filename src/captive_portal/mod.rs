//! 离线留言门户
//!
//! 热点 + DNS 劫持 + HTTP 表单，提交的内容追加到 `MessageQueue`。

mod dns;
mod handlers;
mod html;
mod server;

pub use dns::CaptiveDns;
pub use handlers::{Assets, PortalHandler};
pub use server::CaptivePortal;
