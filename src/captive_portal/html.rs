//! 内置页面内容（存储分区上缺少页面时使用）

/// 确认页缺失时的最小回复
pub const SAVED_FALLBACK_HTML: &str = "<h1>Saved!</h1><p>(thanks.html not found)</p>";

pub const BAD_REQUEST: &str = "Bad Request";

pub fn asset_missing(name: &str) -> String {
    format!("Error: {} missing.", name)
}
