//! # 原始字节加载模块
//!
//! ## 设计思路
//!
//! `ByteFetcher` 是“按资源定位符取字节”的可注入接口；默认实现 `HttpFetcher`
//! 统一处理 http(s) / Data URL / 本地文件三类来源，并在“尽可能早”的阶段执行体积校验。
//!
//! ## 实现思路
//!
//! - HTTP：复用型 `reqwest::Client`（连接/总超时 + 重定向上限）+ 状态码校验
//!   + `Content-Length` 预检 + 流式读取（首包/分块超时、累计体积上限）。
//! - Data URL：base64 解码前先估算体积上限。
//! - 文件：metadata 体积预检 + `tokio::fs` 读取。
//! - 不做任何自动重试，失败直接交给调用方。

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{FetchError, PolyfillConfig};

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;
const ACCEPT_IMAGE: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError>;
}

/// 默认字节加载器。
pub struct HttpFetcher {
    client: reqwest::Client,
    config: PolyfillConfig,
}

impl HttpFetcher {
    /// 根据配置构建加载器。
    ///
    /// 这里同时构建复用型 HTTP 客户端，减少每次请求的初始化开销。
    pub fn new(config: &PolyfillConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP 客户端初始化失败：{}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn load_from_http(&self, url: reqwest::Url) -> Result<Bytes, FetchError> {
        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(url.as_str()));

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, ACCEPT_IMAGE)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, url.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: Self::status_message(status.as_u16()).to_string(),
            });
        }

        let total_len = response.content_length();
        if let Some(size) = total_len {
            self.ensure_within_limit(size, "文件过大")?;
        }

        let initial_capacity = total_len
            .map(|len| len.min(self.config.max_file_size).min(usize::MAX as u64) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = BytesMut::with_capacity(initial_capacity);
        let mut response = response;
        let mut received_first_chunk = false;

        loop {
            let read_timeout = if received_first_chunk {
                Duration::from_millis(self.config.stream_chunk_timeout_ms)
            } else {
                Duration::from_millis(self.config.stream_first_byte_timeout_ms)
            };

            let next_chunk = tokio::time::timeout(read_timeout, response.chunk())
                .await
                .map_err(|_| {
                    if received_first_chunk {
                        FetchError::Timeout("下载数据流读取超时".to_string())
                    } else {
                        FetchError::Timeout("下载首包超时".to_string())
                    }
                })?
                .map_err(|e| self.map_reqwest_error(e, url.as_str()))?;

            let Some(chunk) = next_chunk else {
                break;
            };

            received_first_chunk = true;
            self.ensure_within_limit((buffer.len() + chunk.len()) as u64, "下载体积超限")?;
            buffer.extend_from_slice(&chunk);
        }

        log::debug!("📦 下载完成 - {} 字节", buffer.len());
        Ok(buffer.freeze())
    }

    fn load_from_data_url(&self, data: &str) -> Result<Bytes, FetchError> {
        log::debug!("📝 开始解析 Data URL（{} 字符）", data.len());

        let base64_start = data
            .find(";base64,")
            .ok_or_else(|| FetchError::InvalidFormat("仅支持 base64 编码的 Data URL".to_string()))?;
        let base64_data = data[base64_start + 8..].trim();

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(base64_data)?;
        self.ensure_within_limit(estimated_len, "Base64 预计解码体积过大")?;

        general_purpose::STANDARD
            .decode(base64_data)
            .map(Bytes::from)
            .map_err(|e| FetchError::InvalidFormat(format!("Base64 解码失败：{}", e)))
    }

    async fn load_from_file(&self, path: &Path) -> Result<Bytes, FetchError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::FileSystem(format!("文件不存在：{}", path.display()))
            } else {
                FetchError::FileSystem(format!("无法读取文件信息：{}", e))
            }
        })?;

        self.ensure_within_limit(metadata.len(), "文件过大")?;

        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|e| FetchError::FileSystem(format!("无法读取图片文件：{}", e)))
    }

    fn ensure_within_limit(&self, size: u64, what: &str) -> Result<(), FetchError> {
        if size > self.config.max_file_size {
            return Err(FetchError::ResourceLimit(format!(
                "{}：{:.2} MB（限制：{:.2} MB）",
                what,
                size as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, FetchError> {
        let len = base64_data.len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| FetchError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| FetchError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> FetchError {
        let err_msg = e.to_string().replace(url, &redact_url_for_log(url));

        if e.is_timeout() {
            FetchError::Timeout(format!("下载超时（{}秒）", self.config.download_timeout))
        } else if e.is_connect() {
            FetchError::Network(format!("无法连接：{}", err_msg))
        } else if e.is_redirect() {
            FetchError::Network(format!(
                "重定向次数超过限制（{}）：{}",
                self.config.max_redirects, err_msg
            ))
        } else {
            FetchError::Network(format!("请求失败：{}", err_msg))
        }
    }

    /// 常见 HTTP 状态码本地化文案。
    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(FetchError::InvalidUrl("资源地址为空".to_string()));
        }

        if locator.starts_with("data:") {
            return self.load_from_data_url(locator);
        }

        match reqwest::Url::parse(locator) {
            Ok(url) => match url.scheme() {
                "http" | "https" => self.load_from_http(url).await,
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| FetchError::InvalidUrl(format!("无效的文件地址：{}", locator)))?;
                    self.load_from_file(&path).await
                }
                // Windows 盘符路径（`C:\...`）会被解析成单字母协议
                scheme if scheme.len() == 1 => self.load_from_file(&PathBuf::from(locator)).await,
                scheme => Err(FetchError::InvalidUrl(format!("不支持的协议：{}", scheme))),
            },
            Err(_) => self.load_from_file(Path::new(locator)).await,
        }
    }
}

/// 去掉 query / fragment 后用于日志输出；Data URL 只输出长度。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    if url.starts_with("data:") {
        return format!("data:<{} chars>", url.len());
    }

    let Ok(parsed) = reqwest::Url::parse(url) else {
        return url.to_string();
    };

    let host = parsed.host_str().unwrap_or("");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = parsed.path();

    format!("{}://{}{}{}", parsed.scheme(), host, port, path)
}
