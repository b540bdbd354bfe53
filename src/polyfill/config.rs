//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `PolyfillConfig`：下载限制、解码资源上限、结果缓存策略。
//! 配置可直接构造，也可从 JSON 读取（字段缺省时回落到 `Default`）。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - `validate` 在构造 `WebpMachine` 前统一做范围检查，尽早失败。

use serde::{Deserialize, Serialize};

use crate::error::PolyfillError;

/// Polyfill 配置。
///
/// 字段覆盖了下载、解码与结果缓存三个阶段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyfillConfig {
    /// 下载/读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 网络下载总超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 下载首包超时时间（毫秒）。
    pub stream_first_byte_timeout_ms: u64,
    /// 下载分块读取超时时间（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 结果缓存容量；`None` 表示不限容量、永不淘汰。
    pub result_cache_capacity: Option<usize>,
    /// 命中缓存后是否直接返回，不再重新下载解码。
    pub short_circuit_cache_hits: bool,
}

impl Default for PolyfillConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            stream_first_byte_timeout_ms: 10_000,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            result_cache_capacity: None,
            short_circuit_cache_hits: false,
        }
    }
}

impl PolyfillConfig {
    /// 从 JSON 文本读取配置，并立即校验。
    ///
    /// # 示例
    /// ```rust
    /// use webp_polyfill::PolyfillConfig;
    ///
    /// let config = PolyfillConfig::from_json_str(r#"{ "short_circuit_cache_hits": true }"#)?;
    /// assert!(config.short_circuit_cache_hits);
    /// assert_eq!(config.max_redirects, 5);
    /// # Ok::<(), webp_polyfill::PolyfillError>(())
    /// ```
    pub fn from_json_str(content: &str) -> Result<Self, PolyfillError> {
        let config = serde_json::from_str::<Self>(content)
            .map_err(|e| PolyfillError::Config(format!("解析配置失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验各项参数是否在允许范围内。
    pub fn validate(&self) -> Result<(), PolyfillError> {
        if self.max_file_size == 0 {
            return Err(PolyfillError::Config("max_file_size 必须大于 0".to_string()));
        }
        if self.download_timeout == 0 {
            return Err(PolyfillError::Config("download_timeout 必须大于 0".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(PolyfillError::Config("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        if !(500..=120_000).contains(&self.stream_first_byte_timeout_ms) {
            return Err(PolyfillError::Config(
                "stream_first_byte_timeout_ms 必须在 500~120000 毫秒之间".to_string(),
            ));
        }
        if !(500..=120_000).contains(&self.stream_chunk_timeout_ms) {
            return Err(PolyfillError::Config(
                "stream_chunk_timeout_ms 必须在 500~120000 毫秒之间".to_string(),
            ));
        }
        if self.max_decoded_pixels == 0 {
            return Err(PolyfillError::Config("max_decoded_pixels 必须大于 0".to_string()));
        }
        if self.max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(PolyfillError::Config("max_decoded_bytes 不能小于 8MB".to_string()));
        }
        if self.result_cache_capacity == Some(0) {
            return Err(PolyfillError::Config(
                "result_cache_capacity 不能为 0（不限容量请使用 null）".to_string(),
            ));
        }

        Ok(())
    }
}
