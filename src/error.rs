//! 统一错误类型模块
//!
//! # 设计思路
//!
//! `PolyfillError` 是对外操作（`polyfill_image` / `polyfill_document` / 构造）的唯一错误类型。
//! 每跨过一层边界就追加一段上下文前缀（decode → polyfill_image → polyfill_document），
//! 根因通过 `#[source]` 链保留，调用方既能读到完整文案，也能按 `ErrorKind` 分支处理。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `kind()` 穿透 `Document` 包装层，返回最内层失败的类别。
//! - `code()` 提供稳定字符串，便于日志检索与上层映射。

use crate::polyfill::{DecodeError, FetchError};

/// 失败类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 已有解码在进行中。
    Busy,
    /// 引擎拒绝字节或输出编码失败。
    DecodeFailed,
    /// 原始字节加载失败。
    FetchFailed,
    /// 构造阶段配置非法。
    InvalidConfig,
}

/// 对外统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum PolyfillError {
    /// 单张图片加载失败
    #[error("polyfill_image 失败（{locator}）：{source}")]
    Fetch {
        locator: String,
        #[source]
        source: FetchError,
    },

    /// 单张图片解码失败（包括解码器忙）
    #[error("polyfill_image 失败（{locator}）：{source}")]
    Decode {
        locator: String,
        #[source]
        source: DecodeError,
    },

    /// 文档扫描在第 `index` 张图片处中止
    #[error("polyfill_document 失败（第 {index} 张图片）：{source}")]
    Document {
        index: usize,
        #[source]
        source: Box<PolyfillError>,
    },

    /// 配置校验失败
    #[error("配置错误：{0}")]
    Config(String),
}

impl PolyfillError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::FetchFailed,
            Self::Decode { .. } => ErrorKind::DecodeFailed,
            Self::Document { source, .. } => source.kind(),
            Self::Config(_) => ErrorKind::InvalidConfig,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch { source, .. } => source.code(),
            Self::Decode { source, .. } => source.code(),
            Self::Document { source, .. } => source.code(),
            Self::Config(_) => "E_CONFIG",
        }
    }

    /// 出错图片的资源定位符（配置错误没有）。
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::Fetch { locator, .. } | Self::Decode { locator, .. } => Some(locator),
            Self::Document { source, .. } => source.locator(),
            Self::Config(_) => None,
        }
    }
}
