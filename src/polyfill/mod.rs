//! # WebP polyfill 模块（polyfill）
//!
//! ## 设计思路
//!
//! 该模块将“原生支持探测 → 字节加载 → 单飞解码 → 结果缓存 → 替换图片来源”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `handler`：`WebpMachine`，编排整条处理流程
//! - `capability`：原生支持探测与记忆化
//! - `loader`：http(s) / Data URL / 文件字节加载与体积校验
//! - `decoder`：单飞解码闸门（忙碌即拒绝）
//! - `pipeline`：解码引擎接口、默认引擎、输出画布与 Data URL 导出
//! - `cache`：地址 → Data URL 结果缓存
//! - `source`：图片引用与文档接口
//! - `config/error`：配置、错误
//!
//! ## 新同事快速上手
//!
//! ```text
//! polyfill_document
//!    ↓（逐张、串行、首错即停）
//! polyfill_image
//!    ├─ capability（原生支持？直接返回）
//!    ├─ cache（命中先应用）
//!    ├─ loader（取字节）
//!    └─ decoder（单飞）→ pipeline（引擎渲染 → PNG Data URL）
//!    ↓
//! 写缓存 + 替换 src
//! ```
//!
//! ## 分层职责建议
//!
//! - 替换解码实现优先实现 `DecodeEngine`，不要改 `decoder.rs`
//! - 换网络栈或接入自有资源系统优先实现 `ByteFetcher`
//! - 流程顺序变更优先改 `handler.rs`

mod cache;
mod capability;
mod config;
mod decoder;
mod error;
mod handler;
mod loader;
mod pipeline;
mod source;

pub use cache::ResultCache;
pub use capability::{CapabilityProbe, FixedCapability, ProbeFn, SampleRenderProbe};
pub use config::PolyfillConfig;
pub use decoder::SingleFlightDecoder;
pub use error::{DecodeError, EngineError, FetchError};
pub use handler::{WebpMachine, WebpMachineOptions};
pub use loader::{ByteFetcher, HttpFetcher};
pub use pipeline::{BLANK_DATA_URL, DecodeEngine, ImageCrateEngine, Surface};
pub use source::{ImageDocument, ImageElement};
