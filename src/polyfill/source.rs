//! # 图片引用与文档模型
//!
//! ## 设计思路
//!
//! DOM 遍历与修改由调用方提供，这里只约定两个最小接口：
//! - `ImageElement`：可读写显示来源（`src`）的图片引用
//! - `ImageDocument`：按文档顺序给出全部图片引用
//!
//! 切片与 `Vec` 自动视为文档，便于处理脱离页面的图片集合。

/// 可被替换显示来源的图片引用。
pub trait ImageElement {
    /// 当前显示来源（资源定位符或 Data URL）。
    fn src(&self) -> String;

    fn set_src(&mut self, src: String);
}

/// 图片引用的容器，按文档顺序枚举。
pub trait ImageDocument {
    type Image: ImageElement;

    fn images_mut(&mut self) -> Vec<&mut Self::Image>;
}

impl<I: ImageElement> ImageDocument for [I] {
    type Image = I;

    fn images_mut(&mut self) -> Vec<&mut I> {
        self.iter_mut().collect()
    }
}

impl<I: ImageElement> ImageDocument for Vec<I> {
    type Image = I;

    fn images_mut(&mut self) -> Vec<&mut I> {
        self.iter_mut().collect()
    }
}
