//! # 图样图像加载
//!
//! 通过 `image` 读取 PNG/TIFF 图样，转为 `[0, 1]` 浮点 RGB 后取三通道平均作为灰度。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `image` 解码

use crate::error::{Result, RheedError};

use ndarray::Array2;
use std::path::Path;

/// 读取图像为 `(height, width)` 灰度数组
pub fn load_image(path: &Path) -> Result<Array2<f64>> {
    let img = image::open(path)
        .map_err(|e| RheedError::ImageError {
            path: path.display().to_string(),
            source: e,
        })?
        .to_rgb32f();

    let (width, height) = img.dimensions();
    Ok(Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        let p = img.get_pixel(c as u32, r as u32);
        (p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0
    }))
}
