//! # 峰形混合模型
//!
//! 多峰区域的光谱分解：N 个峰形分量 `(height, center, width)` 加多项式背景。
//!
//! ## 峰形
//! | 峰形 | 单位高度轮廓 | width ← FWHM | 面积 |
//! |------|--------------|--------------|------|
//! | Gaussian | exp(-(x-c)²/2σ²) | FWHM/2.355 | h·σ·√(2π) |
//! | Lorentzian | γ²/((x-c)²+γ²) | FWHM/2 | h·γ·π |
//! | Voigt | 伪 Voigt (γ = σ) | FWHM/3.6013 | h·σ·√(2π) |
//!
//! Voigt 采用 Thompson-Cox-Hastings 伪 Voigt 近似：总 FWHM = 3.6013σ，
//! 由同 FWHM 的 Lorentzian 与 Gaussian 按混合系数 η 线性组合。
//!
//! ## 初始猜测
//! - `SpanWidth`: 所有分量宽度 = (最大峰位 - 最小峰位) / (2N)
//! - `HalfMaximum`: 在峰两侧 `window` 个采样内估计半高宽
//!
//! ## 依赖关系
//! - 使用 `numeric/least_squares.rs` 进行非线性拟合
//! - 被 `phaser/intensity.rs` 和 `commands/analyze.rs` 使用

use crate::error::{Result, RheedError};
use crate::models::spectrum::Spectrum;
use crate::numeric::least_squares::{curve_fit, FitConfig, FitError};

use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_2, PI};

/// Gaussian FWHM / σ
const GAUSS_FWHM: f64 = 2.355;
/// Voigt (γ = σ) FWHM / σ
const VOIGT_FWHM: f64 = 3.6013;

/// 峰形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PeakShape {
    #[default]
    Gaussian,
    Lorentzian,
    Voigt,
}

impl PeakShape {
    /// 单位高度轮廓
    pub fn profile(self, x: f64, center: f64, width: f64) -> f64 {
        let dx = x - center;
        match self {
            PeakShape::Gaussian => (-dx * dx / (2.0 * width * width)).exp(),
            PeakShape::Lorentzian => width * width / (dx * dx + width * width),
            PeakShape::Voigt => {
                let fwhm = VOIGT_FWHM * width.abs();
                let eta = voigt_eta();
                let gamma = fwhm / 2.0;
                let sigma = fwhm / (8.0 * LN_2).sqrt();
                let lorentz = gamma * gamma / (dx * dx + gamma * gamma);
                let gauss = (-dx * dx / (2.0 * sigma * sigma)).exp();
                eta * lorentz + (1.0 - eta) * gauss
            }
        }
    }

    /// 由半高宽换算宽度参数
    pub fn width_from_fwhm(self, fwhm: f64) -> f64 {
        match self {
            PeakShape::Gaussian => fwhm / GAUSS_FWHM,
            PeakShape::Lorentzian => fwhm / 2.0,
            PeakShape::Voigt => fwhm / VOIGT_FWHM,
        }
    }

    pub fn fwhm_from_width(self, width: f64) -> f64 {
        match self {
            PeakShape::Gaussian => width.abs() * GAUSS_FWHM,
            PeakShape::Lorentzian => width.abs() * 2.0,
            PeakShape::Voigt => width.abs() * VOIGT_FWHM,
        }
    }

    /// 峰面积
    pub fn area(self, height: f64, width: f64) -> f64 {
        match self {
            PeakShape::Gaussian | PeakShape::Voigt => height * width.abs() * (2.0 * PI).sqrt(),
            PeakShape::Lorentzian => height * width.abs() * PI,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PeakShape::Gaussian => "gaussian",
            PeakShape::Lorentzian => "lorentzian",
            PeakShape::Voigt => "voigt",
        }
    }
}

/// γ = σ 时伪 Voigt 的 Lorentzian 混合系数
fn voigt_eta() -> f64 {
    let ratio = 2.0 / VOIGT_FWHM;
    1.36603 * ratio - 0.47719 * ratio.powi(2) + 0.11116 * ratio.powi(3)
}

/// 初始猜测策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GuessStrategy {
    /// 由峰位跨度平分宽度
    SpanWidth,
    /// 在峰两侧 `window` 个采样内估计半高宽
    HalfMaximum { window: usize },
}

/// 混合模型配置
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureConfig {
    pub shape: PeakShape,
    /// 背景多项式阶数，0 为常数偏移
    pub background_degree: usize,
    pub guess: GuessStrategy,
    pub fit: FitConfig,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            shape: PeakShape::Gaussian,
            background_degree: 0,
            guess: GuessStrategy::SpanWidth,
            fit: FitConfig::default(),
        }
    }
}

/// 一个峰形分量
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Component {
    pub height: f64,
    pub center: f64,
    pub width: f64,
}

/// 峰形分量 + 多项式背景
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureModel {
    pub shape: PeakShape,
    pub components: Vec<Component>,
    /// 背景系数 `c0 + c1·x + c2·x² + ...`
    pub background: Vec<f64>,
}

impl MixtureModel {
    /// 展平为 `[h, c, w] * N + 背景系数`
    pub fn params(&self) -> Vec<f64> {
        self.components
            .iter()
            .flat_map(|c| [c.height, c.center, c.width])
            .chain(self.background.iter().copied())
            .collect()
    }

    fn with_params(&self, params: &[f64]) -> Self {
        let n = self.components.len();
        let components = params[..3 * n]
            .chunks_exact(3)
            .map(|p| Component {
                height: p[0],
                center: p[1],
                width: p[2],
            })
            .collect();
        Self {
            shape: self.shape,
            components,
            background: params[3 * n..].to_vec(),
        }
    }

    fn eval_params(shape: PeakShape, n: usize, x: f64, p: &[f64]) -> f64 {
        let peaks: f64 = p[..3 * n]
            .chunks_exact(3)
            .map(|c| c[0] * shape.profile(x, c[1], c[2]))
            .sum();
        let background = p[3 * n..]
            .iter()
            .rev()
            .fold(0.0, |acc, coef| acc * x + coef);
        peaks + background
    }

    /// 第 `k` 个分量的 `center ± |width|` 窗口
    pub fn component_window(&self, k: usize) -> Option<(f64, f64)> {
        let c = self.components.get(k)?;
        let half = c.width.abs();
        Some((c.center - half, c.center + half))
    }

    /// 根据峰位构造初始猜测
    pub fn guess(
        spectrum: &Spectrum,
        peaks: &[usize],
        shape: PeakShape,
        strategy: GuessStrategy,
        background_degree: usize,
    ) -> Result<Self> {
        if peaks.is_empty() {
            return Err(RheedError::InvalidArgument(
                "mixture model needs at least one peak".to_string(),
            ));
        }
        let positions = spectrum.peak_positions(peaks)?;
        let heights = spectrum.peak_heights(peaks)?;

        let widths: Vec<f64> = match strategy {
            GuessStrategy::SpanWidth => {
                let min = positions.iter().copied().fold(f64::INFINITY, f64::min);
                let max = positions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                vec![(max - min) / (2.0 * peaks.len() as f64); peaks.len()]
            }
            GuessStrategy::HalfMaximum { window } => peaks
                .iter()
                .zip(&heights)
                .map(|(&p, &h)| shape.width_from_fwhm(half_maximum_width(spectrum, p, h, window)))
                .collect(),
        };

        let components = positions
            .iter()
            .zip(&heights)
            .zip(&widths)
            .map(|((&center, &height), &width)| Component {
                height,
                center,
                width,
            })
            .collect();

        Ok(Self {
            shape,
            components,
            background: vec![0.0; background_degree + 1],
        })
    }

    /// 以当前参数为初值拟合光谱
    pub fn fit(&self, spectrum: &Spectrum, config: &FitConfig) -> std::result::Result<MixtureFit, FitError> {
        let shape = self.shape;
        let n = self.components.len();
        let out = curve_fit(
            |x, p| Self::eval_params(shape, n, x, p),
            spectrum.ws(),
            spectrum.spec(),
            &self.params(),
            config,
        )?;

        if out.params.iter().any(|p| !p.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(MixtureFit {
            model: self.with_params(&out.params),
            std_errors: out.std_errors(),
            cost: out.cost,
            iterations: out.iterations,
        })
    }
}

/// 峰窗口内不低于半高的最左、最右采样之间的距离
fn half_maximum_width(spectrum: &Spectrum, peak: usize, height: f64, window: usize) -> f64 {
    let lo = peak.saturating_sub(window);
    let hi = (peak + window).min(spectrum.len());
    let ws = &spectrum.ws()[lo..hi];
    let spec = &spectrum.spec()[lo..hi];
    let half = height / 2.0;

    let above: Vec<usize> = (0..spec.len()).filter(|&i| spec[i] >= half).collect();
    match (above.first(), above.last()) {
        (Some(&l), Some(&r)) => ws[r] - ws[l],
        _ => ws.last().copied().unwrap_or(0.0) - ws.first().copied().unwrap_or(0.0),
    }
}

/// 拟合质量判据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitQuality {
    /// 参数相对标准误差上限 (%)
    pub max_relative_error_pct: f64,
    /// 分量半高宽上限
    pub max_fwhm: Option<f64>,
    /// 缺少标准误差时是否视为可信
    pub allow_missing_errors: bool,
}

impl Default for FitQuality {
    fn default() -> Self {
        Self {
            max_relative_error_pct: 100.0,
            max_fwhm: None,
            allow_missing_errors: false,
        }
    }
}

/// 拟合结果
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureFit {
    pub model: MixtureModel,
    /// 与 `model.params()` 对齐的标准误差
    pub std_errors: Option<Vec<f64>>,
    pub cost: f64,
    pub iterations: usize,
}

impl MixtureFit {
    /// 拟合结果是否可疑（误差过大、半高宽过大或无法估计误差）
    pub fn is_suspicious(&self, quality: &FitQuality) -> bool {
        let Some(errors) = &self.std_errors else {
            return !quality.allow_missing_errors;
        };

        let high_error = self
            .model
            .params()
            .iter()
            .zip(errors)
            .filter(|(v, _)| v.abs() > f64::EPSILON)
            .any(|(v, e)| (e / v * 100.0).max(0.0) > quality.max_relative_error_pct);

        let wide = quality.max_fwhm.is_some_and(|limit| {
            self.model
                .components
                .iter()
                .any(|c| self.model.shape.fwhm_from_width(c.width) > limit)
        });

        high_error || wide
    }
}
