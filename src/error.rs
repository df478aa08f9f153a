//! 错误类型
//!
//! 所有错误都在本地处理，只有两种会以 HTTP 响应的形式到达用户（404 / 400）。

/// Kiosk 错误
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    /// 本地页面资源不存在
    #[error("asset {0} missing")]
    AssetMissing(String),
    /// 表单缺少必填字段
    #[error("missing required field `{0}`")]
    Validation(&'static str),
    /// 队列文件无法读写
    #[error("queue storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
    /// 上行网络连接超过重试次数
    #[error("uplink join timed out after {attempts} attempts")]
    NetworkJoinTimeout { attempts: u32 },
    /// 单条记录上传失败
    #[error("upload failed: {0}")]
    UploadFailure(String),
}

pub type Result<T> = std::result::Result<T, KioskError>;
