//! # 解析器模块
//!
//! 图样、掩码、一维光谱与采集配置的加载器。
//!
//! ## 支持格式
//! | 扩展名 | 内容 |
//! |--------|------|
//! | png, tif, tiff | 灰度图样 / 掩码图像 |
//! | txt, csv, tsv, dat | 分隔文本网格 / 光谱 |
//! | json | 采集配置 |
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `batch/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: config, grid, raster, spectrum

pub mod config;
pub mod grid;
pub mod raster;
pub mod spectrum;

pub use config::load_config;
pub use spectrum::parse_spectrum_file;

use crate::error::{Result, RheedError};
use ndarray::Array2;
use std::path::Path;

/// 掩码二值化阈值
const MASK_THRESHOLD: f64 = 0.5;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "tif", "tiff"];
pub const TEXT_EXTENSIONS: [&str; 4] = ["txt", "csv", "tsv", "dat"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// 是否为可加载的图样文件
pub fn is_pattern_file(path: &Path) -> bool {
    let ext = extension(path);
    IMAGE_EXTENSIONS.contains(&ext.as_str()) || TEXT_EXTENSIONS.contains(&ext.as_str())
}

/// 从文件路径推断格式并加载图样像素
pub fn load_pattern_pixels(path: &Path) -> Result<Array2<f64>> {
    if !path.exists() {
        return Err(RheedError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let ext = extension(path);
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        raster::load_image(path)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        grid::parse_grid_file(path)
    } else {
        Err(RheedError::UnsupportedFormat(format!(
            "Cannot determine pattern format for: {}",
            path.display()
        )))
    }
}

/// 加载二值掩码，像素值大于 0.5 视为掩码内
pub fn load_mask(path: &Path) -> Result<Array2<bool>> {
    Ok(load_pattern_pixels(path)?.mapv(|v| v > MASK_THRESHOLD))
}

/// 以阈值从图样生成掩码
pub fn threshold_mask(pixels: &Array2<f64>, threshold: f64) -> Array2<bool> {
    pixels.mapv(|v| v > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let grid = dir.path().join("mask.txt");
        std::fs::write(&grid, "0 1\n1 0\n").unwrap();
        let mask = load_mask(&grid).unwrap();
        assert_eq!(mask, ndarray::array![[false, true], [true, false]]);

        let other = dir.path().join("pattern.xyz");
        std::fs::write(&other, "0").unwrap();
        assert!(matches!(load_pattern_pixels(&other), Err(RheedError::UnsupportedFormat(_))));
        assert!(!is_pattern_file(&other));
        assert!(is_pattern_file(Path::new("a/b/PATTERN.TIFF")));
    }

    #[test]
    fn test_missing_pattern() {
        let err = load_pattern_pixels(Path::new("/nonexistent/p.png"));
        assert!(matches!(err, Err(RheedError::FileNotFound { .. })));
    }

    #[test]
    fn test_threshold_mask() {
        let m = threshold_mask(&ndarray::array![[0.1, 0.6]], 0.5);
        assert_eq!(m, ndarray::array![[false, true]]);
    }
}
