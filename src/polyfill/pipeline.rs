//! # 解码引擎与输出画布模块
//!
//! ## 设计思路
//!
//! 解码引擎是可替换的黑盒：只接收“字节 + 画布”，要么把像素画进画布，要么失败。
//! 画布（`Surface`）负责把像素转成自包含的 PNG Data URL，与引擎实现解耦。
//!
//! ## 实现思路
//!
//! 默认引擎 `ImageCrateEngine` 基于 `image` crate：
//! 1. 通过文件签名确认是 WebP
//! 2. 只读 header 尺寸，按像素/内存上限快速拒绝
//! 3. 完整解码并写入画布

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;

use super::{EngineError, PolyfillConfig};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";
/// 未绘制过的画布导出结果（与 0x0 canvas 的 `toDataURL()` 一致）。
pub const BLANK_DATA_URL: &str = "data:,";

/// 解码引擎。
///
/// 同步执行，调用方负责在调用前让出调度。
pub trait DecodeEngine: Send + Sync {
    fn render(&self, data: &[u8], surface: &mut Surface) -> Result<(), EngineError>;
}

/// 单次解码使用的输出画布。
#[derive(Debug, Default)]
pub struct Surface {
    pixels: Option<RgbaImage>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将解码得到的 RGBA 像素放到画布上（覆盖旧内容）。
    pub fn present(&mut self, pixels: RgbaImage) {
        self.pixels = Some(pixels);
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels
            .as_ref()
            .map(|pixels| pixels.dimensions())
            .unwrap_or((0, 0))
    }

    pub fn is_blank(&self) -> bool {
        let (width, height) = self.dimensions();
        width == 0 || height == 0
    }

    /// 导出为 `data:image/png;base64,...`。
    ///
    /// 空画布导出 `data:,`。
    pub fn to_data_url(&self) -> Result<String, image::ImageError> {
        let Some(pixels) = self.pixels.as_ref().filter(|_| !self.is_blank()) else {
            return Ok(BLANK_DATA_URL.to_string());
        };

        let mut cursor = Cursor::new(Vec::new());
        pixels.write_to(&mut cursor, ImageFormat::Png)?;

        let encoded = general_purpose::STANDARD.encode(cursor.into_inner());
        Ok(format!("{}{}", PNG_DATA_URL_PREFIX, encoded))
    }
}

/// 基于 `image` crate 的默认 WebP 解码引擎。
#[derive(Debug, Clone)]
pub struct ImageCrateEngine {
    max_decoded_pixels: u64,
    max_decoded_bytes: u64,
}

impl Default for ImageCrateEngine {
    fn default() -> Self {
        Self::new(&PolyfillConfig::default())
    }
}

impl ImageCrateEngine {
    pub fn new(config: &PolyfillConfig) -> Self {
        Self {
            max_decoded_pixels: config.max_decoded_pixels,
            max_decoded_bytes: config.max_decoded_bytes,
        }
    }

    /// 通过文件签名（magic bytes）确认输入是 WebP。
    fn validate_webp_signature(data: &[u8]) -> Result<(), EngineError> {
        if data.is_empty() {
            return Err(EngineError::new("图片内容为空"));
        }

        let kind = infer::get(data).ok_or_else(|| EngineError::new("无法识别图片类型"))?;
        if kind.mime_type() != "image/webp" {
            return Err(EngineError::new(format!(
                "文件签名不是 WebP：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }

    /// 仅读取 header 中的宽高，用于完整解码前的资源检查。
    fn inspect_dimensions(data: &[u8]) -> Result<(u32, u32), EngineError> {
        ImageReader::with_format(Cursor::new(data), ImageFormat::WebP)
            .into_dimensions()
            .map_err(|e| EngineError::new(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_limits(&self, width: u32, height: u32) -> Result<(), EngineError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| EngineError::new("图片像素数溢出"))?;

        if pixels > self.max_decoded_pixels {
            return Err(EngineError::new(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, self.max_decoded_pixels
            )));
        }

        let estimated = pixels
            .checked_mul(4)
            .ok_or_else(|| EngineError::new("图片解码内存估算溢出"))?;

        if estimated > self.max_decoded_bytes {
            return Err(EngineError::new(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                self.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}

impl DecodeEngine for ImageCrateEngine {
    fn render(&self, data: &[u8], surface: &mut Surface) -> Result<(), EngineError> {
        Self::validate_webp_signature(data)?;

        let (width, height) = Self::inspect_dimensions(data)?;
        self.validate_limits(width, height)?;

        let decoded = image::load_from_memory_with_format(data, ImageFormat::WebP)
            .map_err(|e| EngineError::new(format!("图片解码失败：{}", e)))?;

        log::debug!("🖼️ WebP 解码完成 - 尺寸: {}x{}", width, height);
        surface.present(decoded.to_rgba8());
        Ok(())
    }
}
