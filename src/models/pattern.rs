//! # RHEED 图样数据模型
//!
//! 二维强度图样，附带可选的感兴趣区域 (AOI) 掩码与采集配置。
//!
//! ## 预处理
//! - `clip`: 截断到给定区间
//! - `mean_clip`: 减去 AOI（或全局）平均值并截断到 [0, 1]，用于抑制噪声
//! - `min_max_scale`: 最小-最大缩放
//! - `standard_norm`: 以 AOI（或全局）均值和标准差标准化
//! - `crop`: 裁剪图样及 AOI
//!
//! 与光谱一致，每个操作都有原地和复制两种形式。
//!
//! ## 依赖关系
//! - 被 `phaser/mask.rs`、`parsers/`、`commands/` 使用
//! - 使用 `ndarray` 存储像素

use crate::error::{Result, RheedError};
use crate::models::config::RheedConfig;

use ndarray::{s, Array2, Zip};

const NORM_EPS: f64 = 1e-5;

/// RHEED 图样
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pixels: Array2<f64>,
    aoi: Option<Array2<bool>>,
    config: Option<RheedConfig>,
}

impl Pattern {
    pub fn new(pixels: Array2<f64>) -> Self {
        Self {
            pixels,
            aoi: None,
            config: None,
        }
    }

    /// 设置 AOI，AOI 外的像素置为图样最小值
    pub fn with_aoi(mut self, aoi: Array2<bool>) -> Result<Self> {
        if aoi.dim() != self.pixels.dim() {
            return Err(RheedError::ShapeMismatch {
                what: "area of interest".to_string(),
                expected: self.pixels.dim(),
                actual: aoi.dim(),
            });
        }
        let min = self.min_value();
        Zip::from(&mut self.pixels).and(&aoi).for_each(|p, &inside| {
            if !inside {
                *p = min;
            }
        });
        self.aoi = Some(aoi);
        Ok(self)
    }

    pub fn with_config(mut self, config: RheedConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn pixels(&self) -> &Array2<f64> {
        &self.pixels
    }

    pub fn aoi(&self) -> Option<&Array2<bool>> {
        self.aoi.as_ref()
    }

    pub fn config(&self) -> Option<&RheedConfig> {
        self.config.as_ref()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    fn min_value(&self) -> f64 {
        self.pixels.iter().copied().fold(f64::INFINITY, f64::min)
    }

    fn max_value(&self) -> f64 {
        self.pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// AOI 内（无 AOI 时为全体）的均值与总体标准差
    fn stats(&self) -> (f64, f64) {
        let values: Vec<f64> = match &self.aoi {
            Some(aoi) => self
                .pixels
                .iter()
                .zip(aoi.iter())
                .filter(|(_, &inside)| inside)
                .map(|(&p, _)| p)
                .collect(),
            None => self.pixels.iter().copied().collect(),
        };
        if values.is_empty() {
            return (0.0, 0.0);
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    // ─────────────────────────────────────────────────────────────
    // 预处理
    // ─────────────────────────────────────────────────────────────

    pub fn mean_clip(&mut self) -> &mut Self {
        let (mean, _) = self.stats();
        self.pixels.mapv_inplace(|v| (v - mean).clamp(0.0, 1.0));
        self
    }

    pub fn min_max_scale(&mut self) -> &mut Self {
        if self.pixels.is_empty() {
            return self;
        }
        let (min, max) = (self.min_value(), self.max_value());
        let denom = max - min + NORM_EPS;
        self.pixels.mapv_inplace(|v| (v - min) / denom);
        self
    }

    pub fn min_max_scaled(&self) -> Self {
        let mut out = self.clone();
        out.min_max_scale();
        out
    }

    pub fn standard_norm(&mut self) -> &mut Self {
        let (mean, std) = self.stats();
        let denom = std + NORM_EPS;
        self.pixels.mapv_inplace(|v| (v - mean) / denom);
        self
    }

    pub fn standard_normed(&self) -> Self {
        let mut out = self.clone();
        out.standard_norm();
        out
    }

    /// 裁剪出行 `[sx, ex)`、列 `[sy, ey)`
    pub fn cropped(&self, sx: usize, sy: usize, ex: usize, ey: usize) -> Result<Self> {
        let (rows, cols) = self.dim();
        if sx >= ex || sy >= ey || ex > rows || ey > cols {
            return Err(RheedError::ShapeMismatch {
                what: format!("crop window ({}, {})..({}, {})", sx, sy, ex, ey),
                expected: (rows, cols),
                actual: (ex, ey),
            });
        }
        Ok(Self {
            pixels: self.pixels.slice(s![sx..ex, sy..ey]).to_owned(),
            aoi: self.aoi.as_ref().map(|a| a.slice(s![sx..ex, sy..ey]).to_owned()),
            config: self.config.clone(),
        })
    }

    pub fn crop(&mut self, sx: usize, sy: usize, ex: usize, ey: usize) -> Result<&mut Self> {
        *self = self.cropped(sx, sy, ex, ey)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_aoi_masks_outside() {
        let p = Pattern::new(array![[1.0, 5.0], [3.0, 9.0]])
            .with_aoi(array![[true, false], [true, true]])
            .unwrap();
        assert_eq!(p.pixels()[[0, 1]], 1.0);
        assert_eq!(p.pixels()[[1, 1]], 9.0);
    }

    #[test]
    fn test_aoi_shape_checked() {
        let err = Pattern::new(Array2::zeros((2, 2))).with_aoi(Array2::from_elem((3, 2), true));
        assert!(matches!(err, Err(RheedError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_min_max_scale() {
        let p = Pattern::new(array![[2.0, 4.0], [6.0, 10.0]]).min_max_scaled();
        assert!(p.pixels()[[0, 0]].abs() < 1e-12);
        assert!((p.pixels()[[1, 1]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mean_clip() {
        let mut p = Pattern::new(array![[0.0, 0.2], [0.4, 1.4]]);
        p.mean_clip();
        // 均值 0.5
        assert_eq!(p.pixels()[[0, 0]], 0.0);
        assert_eq!(p.pixels()[[1, 0]], 0.0);
        assert!((p.pixels()[[1, 1]] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_standard_norm_uses_aoi() {
        let p = Pattern::new(array![[1.0, 3.0], [100.0, 0.0]])
            .with_aoi(array![[true, true], [false, false]])
            .unwrap()
            .standard_normed();
        // AOI 内均值 2，标准差 1
        assert!((p.pixels()[[0, 0]] + 1.0).abs() < 1e-4);
        assert!((p.pixels()[[0, 1]] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_crop() {
        let p = Pattern::new(Array2::from_shape_fn((4, 5), |(r, c)| (r * 10 + c) as f64));
        let c = p.cropped(1, 2, 3, 5).unwrap();
        assert_eq!(c.dim(), (2, 3));
        assert_eq!(c.pixels()[[0, 0]], 12.0);
        assert!(p.cropped(0, 0, 5, 5).is_err());
    }
}
