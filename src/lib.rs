//! # WebP Polyfill 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                调用方（宿主渲染环境）                     │
//! │                                                          │
//! │   HtmlDocument / 自定义 ImageDocument / ImageElement     │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓ polyfill_document / polyfill_image / decode
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↓            WebpMachine                           │
//! │                                                          │
//! │  ┌─ capability ─ 原生支持探测（只探测一次）               │
//! │  ├─ cache ────── 地址 → PNG Data URL                      │
//! │  ├─ loader ───── http(s) / Data URL / 文件 取字节         │
//! │  └─ decoder ──── 单飞闸门（忙碌即拒绝）                   │
//! │        └─ pipeline  DecodeEngine → Surface → Data URL    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 对外统一错误类型 `PolyfillError` 与 `ErrorKind` |
//! | [`polyfill`] | 探测、加载、单飞解码、缓存与编排 |
//! | [`html`] | 基于 html5ever 文档树的 `ImageDocument` 实现 |

pub mod error;
pub mod html;
pub mod polyfill;

pub use error::{ErrorKind, PolyfillError};
pub use html::{HtmlDocument, HtmlImage};
pub use polyfill::{
    BLANK_DATA_URL,
    ByteFetcher,
    CapabilityProbe,
    DecodeEngine,
    DecodeError,
    EngineError,
    FetchError,
    FixedCapability,
    HttpFetcher,
    ImageCrateEngine,
    ImageDocument,
    ImageElement,
    PolyfillConfig,
    ProbeFn,
    ResultCache,
    SampleRenderProbe,
    SingleFlightDecoder,
    Surface,
    WebpMachine,
    WebpMachineOptions,
};
