//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `WebpMachine` 独占单飞解码器、结果缓存与原生支持信号，只负责流程编排：
//! 1. 原生支持 → 直接返回
//! 2. 非 `.webp` 地址 → 直接返回
//! 3. 命中缓存 → 先把缓存结果应用到图片
//! 4. 加载字节 → 单飞解码 → 写缓存 → 应用结果
//!
//! ## 实现思路
//!
//! - 所有协作者（引擎 / 加载器 / 探测器）以 trait object 注入，缺省时使用内置实现。
//! - 命中缓存默认不提前返回：仍会重新加载解码并覆盖为等价结果；
//!   `short_circuit_cache_hits` 打开后命中即返回。
//! - 文档扫描严格串行：一张图片完整结束后才处理下一张，首个失败立即中止。
//! - 记录 `load/decode/total` 阶段耗时，便于性能诊断。

use once_cell::sync::Lazy;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use crate::error::PolyfillError;

use super::cache::ResultCache;
use super::capability::{CapabilityProbe, CapabilitySignal, FixedCapability};
use super::decoder::SingleFlightDecoder;
use super::loader::{ByteFetcher, HttpFetcher, redact_url_for_log};
use super::pipeline::{DecodeEngine, ImageCrateEngine};
use super::source::{ImageDocument, ImageElement};
use super::{DecodeError, PolyfillConfig};

/// 目标编码的文件名后缀（大小写不敏感，匹配整个地址结尾）。
static WEBP_LOCATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.webp$").unwrap());

pub(crate) fn is_webp_locator(locator: &str) -> bool {
    WEBP_LOCATOR.is_match(locator)
}

/// 构造期可选项。
///
/// 未提供的协作者使用内置实现：`ImageCrateEngine`、`HttpFetcher`、`FixedCapability(false)`。
#[derive(Default)]
pub struct WebpMachineOptions {
    pub engine: Option<Arc<dyn DecodeEngine>>,
    pub capability: Option<Arc<dyn CapabilityProbe>>,
    pub fetcher: Option<Arc<dyn ByteFetcher>>,
    pub config: PolyfillConfig,
}

impl WebpMachineOptions {
    pub fn with_engine(mut self, engine: Arc<dyn DecodeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_capability(mut self, capability: Arc<dyn CapabilityProbe>) -> Self {
        self.capability = Some(capability);
        self
    }

    /// 强制指定是否原生支持（测试或强制 polyfill 场景）。
    pub fn with_native_support(self, supported: bool) -> Self {
        self.with_capability(Arc::new(FixedCapability(supported)))
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_config(mut self, config: PolyfillConfig) -> Self {
        self.config = config;
        self
    }
}

/// WebP polyfill 编排器。
///
/// 同一时间只能解码一张图片，并发解码会得到 `DecodeError::Busy`。
pub struct WebpMachine {
    decoder: SingleFlightDecoder,
    cache: ResultCache,
    fetcher: Arc<dyn ByteFetcher>,
    native_support: CapabilitySignal,
    config: PolyfillConfig,
}

impl WebpMachine {
    /// 使用全部默认协作者创建。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use webp_polyfill::WebpMachine;
    ///
    /// let machine = WebpMachine::new()?;
    /// # Ok::<(), webp_polyfill::PolyfillError>(())
    /// ```
    pub fn new() -> Result<Self, PolyfillError> {
        Self::with_options(WebpMachineOptions::default())
    }

    /// 使用自定义协作者与配置创建。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use webp_polyfill::{PolyfillConfig, WebpMachine, WebpMachineOptions};
    ///
    /// let mut config = PolyfillConfig::default();
    /// config.short_circuit_cache_hits = true;
    ///
    /// let machine = WebpMachine::with_options(
    ///     WebpMachineOptions::default()
    ///         .with_native_support(false)
    ///         .with_config(config),
    /// )?;
    /// # Ok::<(), webp_polyfill::PolyfillError>(())
    /// ```
    pub fn with_options(options: WebpMachineOptions) -> Result<Self, PolyfillError> {
        let WebpMachineOptions {
            engine,
            capability,
            fetcher,
            config,
        } = options;

        config.validate()?;

        let engine = engine.unwrap_or_else(|| Arc::new(ImageCrateEngine::new(&config)));
        let capability = capability.unwrap_or_else(|| Arc::new(FixedCapability(false)));
        let fetcher: Arc<dyn ByteFetcher> = match fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(
                HttpFetcher::new(&config)
                    .map_err(|e| PolyfillError::Config(format!("加载器初始化失败：{}", e)))?,
            ),
        };

        Ok(Self {
            decoder: SingleFlightDecoder::new(engine),
            cache: ResultCache::new(config.result_cache_capacity.and_then(NonZeroUsize::new)),
            fetcher,
            native_support: CapabilitySignal::new(capability),
            config,
        })
    }

    pub fn config(&self) -> &PolyfillConfig {
        &self.config
    }

    /// 宿主是否原生支持 WebP（首次调用时探测，之后复用结果）。
    pub async fn supports_native(&self) -> bool {
        self.native_support.get().await
    }

    /// 是否有解码正在进行。
    pub fn is_busy(&self) -> bool {
        self.decoder.is_busy()
    }

    /// 读取某地址已缓存的 Data URL。
    pub fn cached(&self, locator: &str) -> Option<String> {
        self.cache.get(locator)
    }

    /// 将 WebP 字节解码为 PNG Data URL。
    ///
    /// 已有解码在途时立即返回 `DecodeError::Busy`。
    pub async fn decode(&self, data: &[u8]) -> Result<String, DecodeError> {
        self.decoder.decode(data).await
    }

    /// 对单张图片执行 polyfill。
    pub async fn polyfill_image<I>(&self, image: &mut I) -> Result<(), PolyfillError>
    where
        I: ImageElement + ?Sized,
    {
        if self.supports_native().await {
            return Ok(());
        }

        let locator = image.src();
        if !is_webp_locator(&locator) {
            return Ok(());
        }

        let total_start = Instant::now();
        let log_locator = redact_url_for_log(&locator);

        if let Some(cached) = self.cache.get(&locator) {
            log::debug!("♻️ 命中结果缓存 - {}", log_locator);
            image.set_src(cached);
            if self.config.short_circuit_cache_hits {
                return Ok(());
            }
        }

        let load_start = Instant::now();
        let data = self
            .fetcher
            .fetch(&locator)
            .await
            .map_err(|source| PolyfillError::Fetch {
                locator: locator.clone(),
                source,
            })?;
        let load_elapsed = load_start.elapsed();

        let decode_start = Instant::now();
        let data_url = self
            .decoder
            .decode(&data)
            .await
            .map_err(|source| PolyfillError::Decode {
                locator: locator.clone(),
                source,
            })?;
        let decode_elapsed = decode_start.elapsed();

        self.cache.put(locator, data_url.clone());
        image.set_src(data_url);

        log::info!(
            "✅ 图片 polyfill 完成 - {} load={}ms decode={}ms total={}ms",
            log_locator,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(())
    }

    /// 对文档内全部图片按顺序执行 polyfill，首个失败即中止。
    pub async fn polyfill_document<D>(&self, document: &mut D) -> Result<(), PolyfillError>
    where
        D: ImageDocument + ?Sized,
    {
        if self.supports_native().await {
            return Ok(());
        }

        let images = document.images_mut();
        log::info!("📄 开始文档 polyfill - 图片数: {}", images.len());

        for (index, image) in images.into_iter().enumerate() {
            self.polyfill_image(image)
                .await
                .map_err(|source| PolyfillError::Document {
                    index,
                    source: Box::new(source),
                })?;
        }

        Ok(())
    }
}
