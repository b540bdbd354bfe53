//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 按链路阶段拆分错误：引擎（`EngineError`）、加载（`FetchError`）、解码闸门（`DecodeError`）。
//! 每一层都用 `thiserror` 保留人类可读文案，并通过 `#[source]` 保留根因，
//! 上层（`PolyfillError`）只追加上下文前缀，不吞掉原始错误。

use crate::error::ErrorKind;

/// 解码引擎失败。
///
/// 引擎是可替换的黑盒，因此只携带一条消息。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 原始字节加载错误。
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("地址无效：{0}")]
    InvalidUrl(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "E_INVALID_URL",
            Self::Network(_) => "E_NETWORK",
            Self::Http { .. } => "E_HTTP",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::FileSystem(_) => "E_FILE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
        }
    }
}

/// 单飞解码闸门的错误。
///
/// `Busy` 表示已有解码在进行中，调用方可稍后重试；其余分支均视为解码失败。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("webp 解码错误：解码器忙")]
    Busy,

    #[error("webp 解码错误：{0}")]
    Engine(#[source] EngineError),

    #[error("webp 解码错误：输出编码失败：{0}")]
    Encode(#[source] image::ImageError),
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Busy => "E_BUSY",
            Self::Engine(_) => "E_DECODE",
            Self::Encode(_) => "E_ENCODE",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// 直接调用 `decode` 时的失败类别；经 `polyfill_image` 包装后统一为 `DecodeFailed`。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy => ErrorKind::Busy,
            Self::Engine(_) | Self::Encode(_) => ErrorKind::DecodeFailed,
        }
    }
}
