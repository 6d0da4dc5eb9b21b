//! # 一维光谱数据模型
//!
//! `Spectrum` 为坐标轴 `ws`（严格递增）上的强度序列 `spec`，负责峰值查找和基本预处理。
//! 所有预处理都保持长度和坐标不变，并同时提供原地版本（返回 `&mut Self`）
//! 和复制版本（返回新对象）。
//!
//! `CollapseSpectrum` 为图样中某个包围盒沿行或列求和得到的光谱。
//!
//! ## 依赖关系
//! - 使用 `numeric/` 的峰值查找、平滑、插值与线性最小二乘
//! - 使用 `periodicity/` 进行周期峰族分析
//! - 被 `phaser/`、`parsers/`、`commands/` 使用

use crate::error::{Result, RheedError};
use crate::models::region::BBox;
use crate::numeric::filter::{gaussian_filter1d, quadratic_interpolate};
use crate::numeric::least_squares::linear_least_squares;
use crate::numeric::peaks::{find_peaks, PeakFindConfig, PeakProperties};
use crate::periodicity::distance::{condensed_distances, distance_matrix};
use crate::periodicity::{self, DistanceConfig, PeakFamily};

use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array2, Axis};
use std::ops::{Deref, DerefMut};

/// 归一化分母保护项
const NORM_EPS: f64 = 1e-5;

/// 一维光谱
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    ws: Vec<f64>,
    spec: Vec<f64>,
}

/// 峰间距离的两种形式
#[derive(Debug, Clone, PartialEq)]
pub enum PeakDistances {
    /// 严格下三角按行展开
    Condensed(Vec<f64>),
    /// 完整矩阵
    Full(Array2<f64>),
}

impl Spectrum {
    /// 创建光谱，要求等长且坐标严格递增
    pub fn new(ws: Vec<f64>, spec: Vec<f64>) -> Result<Self> {
        if ws.len() != spec.len() {
            return Err(RheedError::LengthMismatch {
                what: "spectrum coordinates and intensities".to_string(),
                left: ws.len(),
                right: spec.len(),
            });
        }
        if ws.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(RheedError::UnorderedCoordinates);
        }
        Ok(Self { ws, spec })
    }

    /// 以采样序号 `0..n` 为坐标
    pub fn from_values(spec: Vec<f64>) -> Self {
        let ws = (0..spec.len()).map(|i| i as f64).collect();
        Self { ws, spec }
    }

    pub fn ws(&self) -> &[f64] {
        &self.ws
    }

    pub fn spec(&self) -> &[f64] {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.spec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spec.is_empty()
    }

    fn min_max(&self) -> Option<(f64, f64)> {
        if self.spec.is_empty() {
            return None;
        }
        let min = self.spec.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.spec.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }

    // ─────────────────────────────────────────────────────────────
    // 预处理
    // ─────────────────────────────────────────────────────────────

    /// 最小-最大归一化到 [0, 1]
    pub fn normalize(&mut self) -> &mut Self {
        if let Some((min, max)) = self.min_max() {
            let denom = max - min + NORM_EPS;
            for v in &mut self.spec {
                *v = (*v - min) / denom;
            }
        }
        self
    }

    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.normalize();
        out
    }

    /// 高斯平滑
    pub fn smooth(&mut self, sigma: f64) -> &mut Self {
        self.spec = gaussian_filter1d(&self.spec, sigma);
        self
    }

    pub fn smoothed(&self, sigma: f64) -> Self {
        let mut out = self.clone();
        out.smooth(sigma);
        out
    }

    /// 截断到 `[min, max]`
    pub fn clip(&mut self, min: f64, max: f64) -> &mut Self {
        for v in &mut self.spec {
            *v = v.clamp(min, max);
        }
        self
    }

    pub fn clipped(&self, min: f64, max: f64) -> Self {
        let mut out = self.clone();
        out.clip(min, max);
        out
    }

    /// 扣除线性背景
    ///
    /// 用首尾各 `n` 个采样点（`n <= 1` 时只用首尾两点）拟合直线并从整条光谱中减去。
    /// 坐标过于集中导致方程奇异时返回 `SingularMatrix`，光谱保持不变。
    pub fn remove_background(&mut self, n: usize) -> Result<&mut Self> {
        if self.spec.is_empty() {
            return Ok(self);
        }
        let len = self.len();
        let idx: Vec<usize> = if n > 1 {
            let n = n.min(len);
            (0..n).chain(len - n..len).collect()
        } else {
            vec![0, len - 1]
        };

        let design = DMatrix::from_fn(idx.len(), 2, |r, c| if c == 0 { self.ws[idx[r]] } else { 1.0 });
        let y = DVector::from_iterator(idx.len(), idx.iter().map(|&i| self.spec[i]));
        let coef = linear_least_squares(&design, &y)
            .ok_or_else(|| RheedError::SingularMatrix("background removal".to_string()))?;

        let (slope, intercept) = (coef[0], coef[1]);
        for (v, w) in self.spec.iter_mut().zip(&self.ws) {
            *v -= slope * w + intercept;
        }
        Ok(self)
    }

    pub fn without_background(&self, n: usize) -> Result<Self> {
        let mut out = self.clone();
        out.remove_background(n)?;
        Ok(out)
    }

    /// 填补饱和截断区
    ///
    /// 强度超过 `trunc` 的采样点用未截断点的分段二次插值替换；
    /// 未截断点不足 3 个或没有截断点时不做任何改动。
    pub fn fill_truncated(&mut self, trunc: f64) -> &mut Self {
        let kept: Vec<usize> = (0..self.len()).filter(|&i| self.spec[i] <= trunc).collect();
        if kept.len() < 3 || kept.len() == self.len() {
            return self;
        }

        let xs: Vec<f64> = kept.iter().map(|&i| self.ws[i]).collect();
        let ys: Vec<f64> = kept.iter().map(|&i| self.spec[i]).collect();
        let truncated: Vec<usize> = (0..self.len()).filter(|&i| self.spec[i] > trunc).collect();
        let at: Vec<f64> = truncated.iter().map(|&i| self.ws[i]).collect();

        if let Some(filled) = quadratic_interpolate(&xs, &ys, &at) {
            for (i, v) in truncated.into_iter().zip(filled) {
                self.spec[i] = v;
            }
        }
        self
    }

    pub fn filled(&self, trunc: f64) -> Self {
        let mut out = self.clone();
        out.fill_truncated(trunc);
        out
    }

    // ─────────────────────────────────────────────────────────────
    // 峰与周期性
    // ─────────────────────────────────────────────────────────────

    /// 查找峰值
    pub fn find_peaks(&self, config: &PeakFindConfig) -> (Vec<usize>, PeakProperties) {
        find_peaks(&self.spec, config)
    }

    /// 峰索引对应的坐标位置
    ///
    /// 索引必须严格递增且在范围内，否则视为调用方违背约定。
    pub fn peak_positions(&self, peaks: &[usize]) -> Result<Vec<f64>> {
        if let Some(&bad) = peaks.iter().find(|&&p| p >= self.len()) {
            return Err(RheedError::InvalidPeakIndices(format!(
                "index {} out of range for spectrum of length {}",
                bad,
                self.len()
            )));
        }
        if peaks.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RheedError::InvalidPeakIndices(
                "peak indices must be strictly increasing".to_string(),
            ));
        }
        Ok(peaks.iter().map(|&p| self.ws[p]).collect())
    }

    /// 峰高
    pub fn peak_heights(&self, peaks: &[usize]) -> Result<Vec<f64>> {
        self.peak_positions(peaks)?;
        Ok(peaks.iter().map(|&p| self.spec[p]).collect())
    }

    /// 梯形积分强度
    pub fn integrated_intensity(&self) -> f64 {
        self.ws
            .windows(2)
            .zip(self.spec.windows(2))
            .map(|(w, s)| (w[1] - w[0]) * (s[0] + s[1]) / 2.0)
            .sum()
    }

    /// 峰间距离
    ///
    /// `full` 为假时返回压缩的下三角列表；为真时返回完整矩阵，`polar` 控制是否极化。
    pub fn peak_distances(&self, peaks: &[usize], full: bool, polar: bool) -> Result<PeakDistances> {
        let positions = self.peak_positions(peaks)?;
        Ok(if full {
            PeakDistances::Full(distance_matrix(&positions, polar))
        } else {
            PeakDistances::Condensed(condensed_distances(&positions))
        })
    }

    /// 以光谱中点为中心的周期峰族分析，网格范围 `[0, max(ws)]`
    pub fn analyze_peaks_distance_cent(
        &self,
        peaks: &[usize],
        config: &DistanceConfig,
    ) -> Result<Vec<PeakFamily>> {
        let positions = self.peak_positions(peaks)?;
        let grid_max = self.ws.last().copied().unwrap_or(0.0);
        periodicity::analyze_peaks_distance_cent(&positions, grid_max / 2.0, 0.0, grid_max, config)
    }
}

// ─────────────────────────────────────────────────────────────
// CollapseSpectrum
// ─────────────────────────────────────────────────────────────

/// 投影方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseDirection {
    /// 沿行求和，坐标为列号
    Horizontal,
    /// 沿列求和，坐标为行号
    Vertical,
}

/// 包围盒投影光谱
#[derive(Debug, Clone, PartialEq)]
pub struct CollapseSpectrum {
    spectrum: Spectrum,
    bbox: BBox,
    direction: CollapseDirection,
}

impl CollapseSpectrum {
    /// 按方向投影 `pixels` 中 `bbox` 覆盖的部分
    pub fn collapse(pixels: &Array2<f64>, bbox: BBox, direction: CollapseDirection) -> Result<Self> {
        let (rows, cols) = pixels.dim();
        if !bbox.fits(rows, cols) {
            return Err(RheedError::ShapeMismatch {
                what: format!("bounding box {:?}", bbox),
                expected: (rows, cols),
                actual: (bbox.max_row, bbox.max_col),
            });
        }

        let crop = pixels.slice(s![bbox.min_row..bbox.max_row, bbox.min_col..bbox.max_col]);
        let (values, range) = match direction {
            CollapseDirection::Horizontal => (crop.sum_axis(Axis(0)), bbox.min_col..bbox.max_col),
            CollapseDirection::Vertical => (crop.sum_axis(Axis(1)), bbox.min_row..bbox.max_row),
        };
        let spectrum = Spectrum {
            ws: range.map(|i| i as f64).collect(),
            spec: values.to_vec(),
        };

        Ok(Self {
            spectrum,
            bbox,
            direction,
        })
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn direction(&self) -> CollapseDirection {
        self.direction
    }
}

impl Deref for CollapseSpectrum {
    type Target = Spectrum;

    fn deref(&self) -> &Spectrum {
        &self.spectrum
    }
}

impl DerefMut for CollapseSpectrum {
    fn deref_mut(&mut self) -> &mut Spectrum {
        &mut self.spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line(n: usize, f: impl Fn(f64) -> f64) -> Spectrum {
        let ws: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let spec = ws.iter().map(|&x| f(x)).collect();
        Spectrum::new(ws, spec).unwrap()
    }

    #[test]
    fn test_new_validates() {
        assert!(matches!(
            Spectrum::new(vec![0.0, 1.0], vec![1.0]),
            Err(RheedError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Spectrum::new(vec![0.0, 0.0], vec![1.0, 2.0]),
            Err(RheedError::UnorderedCoordinates)
        ));
    }

    #[test]
    fn test_normalize_range() {
        let mut s = line(20, |x| (x / 3.0).sin() * 7.0 + 2.0);
        s.normalize();
        let min = s.spec().iter().copied().fold(f64::INFINITY, f64::min);
        let max = s.spec().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(min.abs() < 1e-5);
        assert!((max - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_copy_variants_leave_original() {
        let s = line(10, |x| x * 2.0);
        let n = s.normalized();
        assert_eq!(s.spec()[9], 18.0);
        assert_eq!(n.ws(), s.ws());
        let c = s.clipped(0.0, 5.0);
        assert_eq!(c.spec()[9], 5.0);
        assert_eq!(c.len(), s.len());
    }

    #[test]
    fn test_processing_copies() {
        let mut s = line(30, |x| 0.5 * x + 3.0);
        s.spec[15] += 4.0;
        let before = s.clone();

        let flat = s.without_background(2).unwrap();
        assert!((flat.spec()[15] - 4.0).abs() < 1e-9);
        assert!(flat.spec()[0].abs() < 1e-9);

        let smooth = s.smoothed(1.0);
        assert!(smooth.spec()[15] < s.spec()[15]);
        assert!(smooth.spec()[14] > s.spec()[14]);

        let mut sat = line(9, |x| 1.0 - (x - 4.0).powi(2) / 16.0);
        sat.clip(0.0, 0.9);
        let filled = sat.filled(0.89);
        assert!((filled.spec()[4] - 1.0).abs() < 1e-9);
        assert_eq!(sat.spec()[4], 0.9);

        assert_eq!(s, before);
        let single = Spectrum::new(vec![5.0], vec![1.0]).unwrap();
        assert!(single.without_background(2).is_err());
    }

    #[test]
    fn test_remove_linear_background() {
        let mut s = line(30, |x| 0.5 * x + 3.0);
        s.spec[15] += 4.0;
        s.remove_background(2).unwrap();
        assert!(s.spec()[0].abs() < 1e-9);
        assert!(s.spec()[29].abs() < 1e-9);
        assert!((s.spec()[15] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_background_singular() {
        let mut s = Spectrum::new(vec![5.0], vec![1.0]).unwrap();
        let err = s.remove_background(2).unwrap_err();
        assert!(matches!(err, RheedError::SingularMatrix(_)));
        assert_eq!(s.spec(), &[1.0]);
    }

    #[test]
    fn test_fill_truncated() {
        let mut s = line(9, |x| 1.0 - (x - 4.0).powi(2) / 16.0);
        s.clip(0.0, 0.9);
        s.fill_truncated(0.89);
        // 截断的 3 个点应回到抛物线上
        for i in 3..=5 {
            let expected = 1.0 - (i as f64 - 4.0).powi(2) / 16.0;
            assert!((s.spec()[i] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fill_truncated_noop() {
        let mut s = line(5, |x| x);
        let before = s.clone();
        s.fill_truncated(10.0);
        assert_eq!(s, before);
        s.fill_truncated(1.5);
        // 仅 2 个未截断点，不插值
        assert_eq!(s, before);
    }

    #[test]
    fn test_integrated_intensity() {
        let s = line(11, |x| x);
        assert!((s.integrated_intensity() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_peak_positions_contract() {
        let s = line(5, |x| x);
        assert_eq!(s.peak_positions(&[1, 3]).unwrap(), vec![1.0, 3.0]);
        assert!(matches!(
            s.peak_positions(&[3, 1]),
            Err(RheedError::InvalidPeakIndices(_))
        ));
        assert!(matches!(
            s.peak_positions(&[7]),
            Err(RheedError::InvalidPeakIndices(_))
        ));
    }

    #[test]
    fn test_peak_distances() {
        let s = line(10, |x| x);
        match s.peak_distances(&[1, 4, 6], false, true).unwrap() {
            PeakDistances::Condensed(d) => assert_eq!(d, vec![3.0, 5.0, 2.0]),
            other => panic!("unexpected {:?}", other),
        }
        match s.peak_distances(&[1, 4, 6], true, true).unwrap() {
            PeakDistances::Full(m) => {
                assert_eq!(m[[0, 2]], 5.0);
                assert_eq!(m[[2, 0]], -5.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_spectrum_family_analysis() {
        // 坐标 0..=120，峰位于 40, 50, 60, 70, 80
        let mut spec = vec![0.0; 121];
        for p in [40, 50, 60, 70, 80] {
            spec[p - 1] = 0.5;
            spec[p] = 1.0;
            spec[p + 1] = 0.5;
        }
        let s = Spectrum::from_values(spec);
        let (peaks, _) = s.find_peaks(&PeakFindConfig::default());
        assert_eq!(peaks, vec![40, 50, 60, 70, 80]);

        let cfg = DistanceConfig::default().abs_tolerant(5.0);
        let families = s.analyze_peaks_distance_cent(&peaks, &cfg).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].peaks_family, vec![0, 1, 2, 3, 4]);
        assert!((families[0].avg_dist - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_collapse_directions() {
        let pixels = array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0]
        ];
        let bbox = BBox::new(1, 1, 3, 3);
        let h = CollapseSpectrum::collapse(&pixels, bbox, CollapseDirection::Horizontal).unwrap();
        assert_eq!(h.ws(), &[1.0, 2.0]);
        assert_eq!(h.spec(), &[16.0, 18.0]);

        let v = CollapseSpectrum::collapse(&pixels, bbox, CollapseDirection::Vertical).unwrap();
        assert_eq!(v.ws(), &[1.0, 2.0]);
        assert_eq!(v.spec(), &[13.0, 21.0]);

        let bad = BBox::new(0, 0, 4, 4);
        assert!(CollapseSpectrum::collapse(&pixels, bad, CollapseDirection::Horizontal).is_err());
    }
}
