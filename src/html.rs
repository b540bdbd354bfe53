//! HTML 文档适配模块
//!
//! # 设计思路
//!
//! 为没有 DOM 的运行环境提供一个最小的 `ImageDocument` 实现：
//! 用 html5ever 按 HTML 规范构建文档树，按文档顺序找出全部 `<img>`，
//! 允许改写其 `src`，再把整棵树序列化回 HTML。
//!
//! # 实现思路
//!
//! - 解析开启脚本模式，与浏览器一致：注释、`<script>`、`<noscript>` 中的文本不会产生图片，
//!   `<template>` 的内容位于独立片段中，同样不参与枚举。
//! - `HtmlImage` 直接持有元素节点，`set_src` 立即写回节点属性。
//! - 提供基准地址时，相对 `src` 按 URL 规则解析为绝对地址（与浏览器 `img.src` 一致）。
//! - 文档树基于 `Rc`，`HtmlDocument` 只能在单线程内使用。

use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, LocalName, Namespace, ParseOpts, QualName, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::fmt;
use std::io;

use crate::polyfill::{ImageDocument, ImageElement};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

fn is_src_attr(attr: &Attribute) -> bool {
    attr.name.ns.is_empty() && &*attr.name.local == "src"
}

/// 文档中的一个 `<img>`。
pub struct HtmlImage {
    node: Handle,
    src: String,
    modified: bool,
}

impl HtmlImage {
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl fmt::Debug for HtmlImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlImage")
            .field("src", &self.src)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl ImageElement for HtmlImage {
    fn src(&self) -> String {
        self.src.clone()
    }

    fn set_src(&mut self, src: String) {
        if let NodeData::Element { attrs, .. } = &self.node.data {
            let mut attrs = attrs.borrow_mut();
            let value = StrTendril::from(src.as_str());
            match attrs.iter_mut().find(|attr| is_src_attr(attr)) {
                Some(attr) => attr.value = value,
                None => attrs.insert(
                    0,
                    Attribute {
                        name: QualName::new(None, Namespace::from(""), LocalName::from("src")),
                        value,
                    },
                ),
            }
        }

        self.src = src;
        self.modified = true;
    }
}

/// 可改写 `<img src>` 的 HTML 文档。
pub struct HtmlDocument {
    dom: RcDom,
    images: Vec<HtmlImage>,
}

impl fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("images", &self.images)
            .finish_non_exhaustive()
    }
}

impl HtmlDocument {
    /// 解析 HTML，`src` 按原文保留。
    ///
    /// # 示例
    /// ```rust
    /// use webp_polyfill::{HtmlDocument, ImageElement};
    ///
    /// let doc = HtmlDocument::parse(r#"<p><img alt="a" src="a.webp"></p>"#);
    /// assert_eq!(doc.images()[0].src(), "a.webp");
    /// ```
    pub fn parse(html: &str) -> Self {
        Self::build(html, None)
    }

    /// 解析 HTML，并将相对 `src` 解析为基于 `base` 的绝对地址。
    pub fn parse_with_base(html: &str, base: &reqwest::Url) -> Self {
        Self::build(html, Some(base))
    }

    fn build(html: &str, base: Option<&reqwest::Url>) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

        let mut images = Vec::new();
        let mut stack = vec![dom.document.clone()];
        while let Some(node) = stack.pop() {
            if let NodeData::Element { name, attrs, .. } = &node.data {
                if &*name.ns == HTML_NAMESPACE && &*name.local == "img" {
                    let raw = attrs
                        .borrow()
                        .iter()
                        .find(|attr| is_src_attr(attr))
                        .map(|attr| attr.value.trim().to_string())
                        .unwrap_or_default();

                    images.push(HtmlImage {
                        node: node.clone(),
                        src: Self::resolve(base, &raw),
                        modified: false,
                    });
                }
            }

            stack.extend(node.children.borrow().iter().rev().cloned());
        }

        log::debug!("📄 HTML 解析完成 - 图片数: {}", images.len());
        Self { dom, images }
    }

    fn resolve(base: Option<&reqwest::Url>, raw: &str) -> String {
        match base {
            Some(base) if !raw.is_empty() => base
                .join(raw)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| raw.to_string()),
            _ => raw.to_string(),
        }
    }

    pub fn images(&self) -> &[HtmlImage] {
        &self.images
    }

    /// 序列化整棵文档树；只有被改写过的 `src` 会变化。
    pub fn to_html(&self) -> io::Result<String> {
        let mut out = Vec::new();
        let document: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut out, &document, SerializeOpts::default())?;

        String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl ImageDocument for HtmlDocument {
    type Image = HtmlImage;

    fn images_mut(&mut self) -> Vec<&mut HtmlImage> {
        self.images.iter_mut().collect()
    }
}
