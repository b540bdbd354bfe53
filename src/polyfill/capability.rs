//! # 原生支持探测
//!
//! ## 设计思路
//!
//! “宿主能否原生渲染 WebP”由可注入的 `CapabilityProbe` 回答，结果由 `CapabilitySignal`
//! 记忆：每个 `WebpMachine` 最多探测一次，之后的读取不会再次触发探测。
//!
//! ## 实现思路
//!
//! - `FixedCapability`：强制给出答案（测试 / 强制 polyfill）。
//! - `ProbeFn`：把异步闭包适配成探测器。
//! - `SampleRenderProbe`：让宿主渲染器渲染 1x1 的 WebP 样本，能画出像素即视为原生支持。
//! - 记忆化使用 `tokio::sync::OnceCell`，并发首次读取也只会执行一次探测。

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::pipeline::{DecodeEngine, Surface};

/// 1x1 有损 WebP 样本。
const LOSSY_WEBP_SAMPLE: &str = "UklGRiIAAABXRUJQVlA4IBYAAAAwAQCdASoBAAEADsD+JaQAA3AAAAAA";

#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn supports_native(&self) -> bool;
}

/// 固定答案的探测器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCapability(pub bool);

#[async_trait]
impl CapabilityProbe for FixedCapability {
    async fn supports_native(&self) -> bool {
        self.0
    }
}

/// 异步闭包探测器。
pub struct ProbeFn<F> {
    probe: F,
}

impl<F, Fut> ProbeFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    pub fn new(probe: F) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl<F, Fut> CapabilityProbe for ProbeFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn supports_native(&self) -> bool {
        (self.probe)().await
    }
}

/// 通过宿主渲染器渲染 WebP 样本来判断原生支持。
pub struct SampleRenderProbe {
    renderer: Arc<dyn DecodeEngine>,
}

impl SampleRenderProbe {
    pub fn new(renderer: Arc<dyn DecodeEngine>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl CapabilityProbe for SampleRenderProbe {
    async fn supports_native(&self) -> bool {
        let sample = match general_purpose::STANDARD.decode(LOSSY_WEBP_SAMPLE) {
            Ok(sample) => sample,
            Err(err) => {
                log::warn!("⚠️ WebP 样本解析失败，按不支持处理：{}", err);
                return false;
            }
        };

        let mut surface = Surface::new();
        match self.renderer.render(&sample, &mut surface) {
            Ok(()) => !surface.is_blank(),
            Err(err) => {
                log::debug!("🔍 宿主渲染 WebP 样本失败：{}", err);
                false
            }
        }
    }
}

/// 记忆化的原生支持信号。
pub(crate) struct CapabilitySignal {
    probe: Arc<dyn CapabilityProbe>,
    resolved: OnceCell<bool>,
}

impl CapabilitySignal {
    pub(crate) fn new(probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            probe,
            resolved: OnceCell::new(),
        }
    }

    pub(crate) async fn get(&self) -> bool {
        *self
            .resolved
            .get_or_init(|| async {
                let supported = self.probe.supports_native().await;
                log::info!("🔍 WebP 原生支持探测结果：{}", supported);
                supported
            })
            .await
    }
}
