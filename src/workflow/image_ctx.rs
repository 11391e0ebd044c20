//! 图片处理上下文
//!
//! 封装"我正在处理第几张图片"这一信息，仅用于日志

use std::fmt::Display;

/// 图片处理上下文
#[derive(Debug, Clone)]
pub struct ImageCtx {
    /// 图片序号（从1开始）
    pub index: usize,

    /// 本批图片总数
    pub total: usize,

    /// 文件名
    pub image_name: String,
}

impl ImageCtx {
    /// 创建新的图片上下文
    pub fn new(index: usize, total: usize, image_name: impl Into<String>) -> Self {
        Self {
            index,
            total,
            image_name: image_name.into(),
        }
    }
}

impl Display for ImageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[图片 {}/{} {}]", self.index, self.total, self.image_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ctx = ImageCtx::new(3, 15, "D5_368.jpg");
        assert_eq!(ctx.to_string(), "[图片 3/15 D5_368.jpg]");
    }
}
