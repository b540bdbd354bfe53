//! # 单飞解码闸门
//!
//! ## 设计思路
//!
//! 同一时间只允许一个解码在途；并发请求直接返回 `DecodeError::Busy`，不排队、不阻塞、不重试。
//! 忙碌标志是实例字段（`AtomicBool`），不是全局状态。
//!
//! ## 实现思路
//!
//! - `BusyGuard` 采用 RAII：`compare_exchange` 抢占标志，`Drop` 时无条件释放，
//!   因此成功、引擎失败、编码失败、future 被中途丢弃等所有路径都会复位。
//! - 抢到标志后先 `yield_now` 让出调度，再进入同步的重计算。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::pipeline::{DecodeEngine, Surface};
use super::DecodeError;

/// 忙碌标志的 RAII 守卫。
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// 标志已被占用时返回 `None`。
    fn acquire(busy: &'a AtomicBool) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { busy })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// 单飞解码器。
pub struct SingleFlightDecoder {
    engine: Arc<dyn DecodeEngine>,
    busy: AtomicBool,
}

impl SingleFlightDecoder {
    pub fn new(engine: Arc<dyn DecodeEngine>) -> Self {
        Self {
            engine,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// 将 WebP 字节解码为 PNG Data URL。
    ///
    /// # 示例
    /// ```rust,ignore
    /// let decoder = SingleFlightDecoder::new(Arc::new(ImageCrateEngine::default()));
    /// let data_url = decoder.decode(&webp_bytes).await?;
    /// assert!(data_url.starts_with("data:image/png;base64,"));
    /// ```
    pub async fn decode(&self, data: &[u8]) -> Result<String, DecodeError> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            log::warn!("⏳ 解码请求被拒绝：已有解码任务进行中");
            return Err(DecodeError::Busy);
        };

        tokio::task::yield_now().await;

        let start = Instant::now();
        let mut surface = Surface::new();
        self.engine
            .render(data, &mut surface)
            .map_err(DecodeError::Engine)?;

        let data_url = surface.to_data_url().map_err(DecodeError::Encode)?;

        log::info!(
            "✅ WebP 解码完成 - input={}B output={}B elapsed={}ms",
            data.len(),
            data_url.len(),
            start.elapsed().as_millis()
        );

        Ok(data_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyfill::EngineError;
    use image::{Rgba, RgbaImage};
    use std::future::Future;
    use std::sync::atomic::AtomicUsize;

    struct CountingEngine {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEngine {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl DecodeEngine for CountingEngine {
        fn render(&self, _data: &[u8], surface: &mut Surface) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::new("corrupt bitstream"));
            }
            surface.present(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
            Ok(())
        }
    }

    #[tokio::test]
    async fn decode_success_releases_busy_flag() {
        let engine = CountingEngine::new(false);
        let decoder = SingleFlightDecoder::new(engine.clone());

        assert!(!decoder.is_busy());
        let url = decoder.decode(b"RIFF").await.expect("decode should succeed");

        assert!(url.starts_with("data:image/png;base64,"));
        assert!(!decoder.is_busy());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn decode_failure_releases_busy_flag_and_wraps_cause() {
        let decoder = SingleFlightDecoder::new(CountingEngine::new(true));

        let error = decoder.decode(b"RIFF").await.expect_err("decode should fail");

        assert!(matches!(error, DecodeError::Engine(_)));
        assert_eq!(error.to_string(), "webp 解码错误：corrupt bitstream");
        assert!(!decoder.is_busy());
    }

    #[tokio::test]
    async fn overlapping_decode_is_rejected_as_busy() {
        let engine = CountingEngine::new(false);
        let decoder = SingleFlightDecoder::new(engine.clone());

        let (first, second) = tokio::join!(decoder.decode(b"a"), decoder.decode(b"b"));

        assert!(first.is_ok());
        assert!(matches!(second, Err(DecodeError::Busy)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert!(!decoder.is_busy());
    }

    #[tokio::test]
    async fn dropped_decode_future_releases_busy_flag() {
        let decoder = SingleFlightDecoder::new(CountingEngine::new(false));

        {
            let pending = decoder.decode(b"a");
            tokio::pin!(pending);
            let polled = futures_poll_once(pending.as_mut()).await;
            assert!(polled.is_none());
            assert!(decoder.is_busy());
        }

        assert!(!decoder.is_busy());
        assert!(decoder.decode(b"b").await.is_ok());
    }

    /// 只 poll 一次：挂起返回 `None`，完成返回 `Some`。
    async fn futures_poll_once<F: Future + Unpin>(mut fut: F) -> Option<F::Output> {
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut fut).poll(cx) {
                std::task::Poll::Ready(output) => Some(output),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }
}
