use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use webp_polyfill::{
    ByteFetcher, DecodeEngine, EngineError, ErrorKind, FetchError, HtmlDocument, ImageElement,
    Surface, WebpMachine, WebpMachineOptions,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_webp_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 40 % 255) as u8, (y * 40 % 255) as u8, 128, 255])
    });

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::WebP)
        .expect("failed to encode test webp");
    cursor.into_inner()
}

fn temp_webp(name: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "webp_polyfill_{}_{}_{name}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));
    std::fs::write(&path, bytes).expect("failed to write temp webp");
    path
}

#[tokio::test]
async fn document_with_local_webp_is_rewritten_end_to_end() {
    init_logger();

    let path = temp_webp("photo.webp", &create_webp_bytes(4, 3));
    let locator = path.to_string_lossy().to_string();
    let html = format!(
        r#"<html><body><img src="{locator}" alt="photo"><img src="logo.png"></body></html>"#
    );

    let machine = WebpMachine::with_options(WebpMachineOptions::default().with_native_support(false))
        .expect("machine init failed");
    let mut document = HtmlDocument::parse(&html);

    machine
        .polyfill_document(&mut document)
        .await
        .expect("document polyfill should succeed");

    let rewritten = document.images()[0].src();
    assert!(rewritten.starts_with("data:image/png;base64,"));
    assert!(document.images()[0].is_modified());
    assert_eq!(document.images()[1].src(), "logo.png");
    assert!(!document.images()[1].is_modified());
    assert_eq!(machine.cached(&locator), Some(rewritten.clone()));

    let output = document.to_html().expect("serialize failed");
    assert!(output.contains(&format!(r#"<img src="{rewritten}" alt="photo">"#)));
    assert!(output.contains(r#"<img src="logo.png">"#));
    assert!(!output.contains(&locator));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn corrupt_local_webp_fails_with_decode_kind() {
    init_logger();

    let path = temp_webp("broken.webp", b"RIFF\x10\x00\x00\x00WEBPVP8 garbage");
    let locator = path.to_string_lossy().to_string();
    let html = format!(r#"<img src="{locator}">"#);

    let machine = WebpMachine::with_options(WebpMachineOptions::default().with_native_support(false))
        .expect("machine init failed");
    let mut document = HtmlDocument::parse(&html);

    let error = machine
        .polyfill_document(&mut document)
        .await
        .expect_err("corrupt webp should fail");

    assert_eq!(error.kind(), ErrorKind::DecodeFailed);
    assert!(!machine.is_busy());
    assert!(!document.images()[0].is_modified());
    assert_eq!(
        document.to_html().expect("serialize failed"),
        HtmlDocument::parse(&html).to_html().expect("serialize failed")
    );

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn native_support_leaves_document_verbatim() {
    init_logger();

    let html = r#"<img src="a.webp"><img src='b.webp'>"#;
    let machine = WebpMachine::with_options(WebpMachineOptions::default().with_native_support(true))
        .expect("machine init failed");
    let mut document = HtmlDocument::parse(html);

    machine
        .polyfill_document(&mut document)
        .await
        .expect("document polyfill should succeed");

    assert_eq!(
        document.to_html().expect("serialize failed"),
        HtmlDocument::parse(html).to_html().expect("serialize failed")
    );
}

/// 记录请求地址，对所有 `.webp` 返回固定字节。
struct RecordingFetcher {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ByteFetcher for RecordingFetcher {
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError> {
        self.calls.lock().expect("calls lock").push(locator.to_string());
        Ok(Bytes::from_static(b"\x07"))
    }
}

/// 画一个 1x1 的像素，颜色由第一个字节决定。
struct OnePixelEngine;

impl DecodeEngine for OnePixelEngine {
    fn render(&self, data: &[u8], surface: &mut Surface) -> Result<(), EngineError> {
        let shade = data.first().copied().unwrap_or(0);
        surface.present(RgbaImage::from_pixel(1, 1, Rgba([shade, 0, 0, 255])));
        Ok(())
    }
}

#[tokio::test]
async fn relative_sources_are_fetched_by_absolute_locator() {
    init_logger();

    let fetcher = Arc::new(RecordingFetcher {
        calls: Mutex::new(Vec::new()),
    });
    let machine = WebpMachine::with_options(
        WebpMachineOptions::default()
            .with_engine(Arc::new(OnePixelEngine))
            .with_fetcher(fetcher.clone())
            .with_native_support(false),
    )
    .expect("machine init failed");

    let base = reqwest::Url::parse("https://example.com/blog/post.html").expect("base url");
    let mut document = HtmlDocument::parse_with_base(
        r#"<img src="img/a.webp"><img src="/static/b.JPG"><img src="../c.webp">"#,
        &base,
    );

    machine
        .polyfill_document(&mut document)
        .await
        .expect("document polyfill should succeed");

    assert_eq!(
        *fetcher.calls.lock().expect("calls lock"),
        vec![
            "https://example.com/blog/img/a.webp".to_string(),
            "https://example.com/c.webp".to_string(),
        ]
    );
    assert!(document.images()[0].src().starts_with("data:image/png;base64,"));
    assert_eq!(document.images()[1].src(), "https://example.com/static/b.JPG");
    assert!(document.images()[2].src().starts_with("data:image/png;base64,"));
    assert!(machine.cached("https://example.com/c.webp").is_some());
}
