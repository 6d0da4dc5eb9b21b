//! # 共享参数组
//!
//! 各子命令通过 `#[command(flatten)]` 复用的参数组，
//! 每组提供 `to_config()` 转为对应的算法配置。
//!
//! ## 依赖关系
//! - 被 `cli/spectrum.rs`、`cli/analyze.rs`、`cli/phase.rs` 使用
//! - 转换目标位于 `numeric/`、`periodicity/`、`phaser/`

use crate::error::{Result, RheedError};
use crate::models::spectrum::CollapseDirection;
use crate::numeric::least_squares::FitConfig;
use crate::numeric::peaks::PeakFindConfig;
use crate::periodicity::DistanceConfig;
use crate::phaser::cluster::ClusterConfig;
use crate::phaser::mask::CleanConfig;
use crate::phaser::mixture::{GuessStrategy, MixtureConfig, PeakShape};

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────
// 峰值查找
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct PeakArgs {
    /// Minimum peak height
    #[arg(long, default_value_t = 0.001)]
    pub height: f64,

    /// Minimum vertical distance to neighbouring samples
    #[arg(long, default_value_t = 0.001)]
    pub threshold: f64,

    /// Minimum peak prominence
    #[arg(long, default_value_t = 0.10)]
    pub prominence: f64,
}

impl PeakArgs {
    pub fn to_config(&self) -> PeakFindConfig {
        PeakFindConfig::default()
            .height(Some(self.height))
            .threshold(Some(self.threshold))
            .prominence(Some(self.prominence))
    }
}

// ─────────────────────────────────────────────────────────────
// 周期峰族
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct DistanceArgs {
    /// Relative tolerance of a grid match (fraction of the spacing)
    #[arg(long, default_value_t = 0.01)]
    pub tolerant: f64,

    /// Absolute tolerance of a grid match and of the center peak
    #[arg(long, default_value_t = 10.0)]
    pub abs_tolerant: f64,

    /// Number of consecutive missing grid points allowed in a family
    #[arg(long, default_value_t = 1)]
    pub allow_discontinue: usize,

    /// Cluster every detected family instead of the exclusive peak groups
    #[arg(long, default_value_t = false)]
    pub overlapping: bool,
}

impl DistanceArgs {
    pub fn to_config(&self) -> DistanceConfig {
        DistanceConfig::default()
            .tolerant(self.tolerant)
            .abs_tolerant(self.abs_tolerant)
            .allow_discontinue(self.allow_discontinue)
    }
}

// ─────────────────────────────────────────────────────────────
// 光谱清洗
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Skip Gaussian smoothing
    #[arg(long, default_value_t = false)]
    pub no_smooth: bool,

    /// Gaussian smoothing sigma (samples)
    #[arg(long, default_value_t = 1.0)]
    pub sigma: f64,

    /// Skip linear background removal
    #[arg(long, default_value_t = false)]
    pub no_background: bool,

    /// Samples taken from each end for the background fit
    #[arg(long, default_value_t = 2)]
    pub background_n: usize,

    /// Skip min-max normalization
    #[arg(long, default_value_t = false)]
    pub no_normalize: bool,
}

impl CleanArgs {
    pub fn to_config(&self) -> CleanConfig {
        CleanConfig::default()
            .smooth(!self.no_smooth)
            .sigma(self.sigma)
            .remove_background(!self.no_background)
            .background_n(self.background_n)
            .normalize(!self.no_normalize)
    }
}

// ─────────────────────────────────────────────────────────────
// 图样与掩码
// ─────────────────────────────────────────────────────────────

/// 投影方向
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum DirectionArg {
    /// Sum over rows (coordinates are columns)
    #[default]
    #[value(alias = "h")]
    Horizontal,
    /// Sum over columns (coordinates are rows)
    #[value(alias = "v")]
    Vertical,
}

impl From<DirectionArg> for CollapseDirection {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Horizontal => CollapseDirection::Horizontal,
            DirectionArg::Vertical => CollapseDirection::Vertical,
        }
    }
}

/// 图样预处理
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ScaleArg {
    /// Keep raw intensities
    #[default]
    None,
    /// Min-max scaling
    MinMax,
    /// Standard normalization over the area of interest
    Standard,
    /// Subtract the mean and clip to [0, 1]
    MeanClip,
}

impl std::fmt::Display for ScaleArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleArg::None => write!(f, "none"),
            ScaleArg::MinMax => write!(f, "min-max"),
            ScaleArg::Standard => write!(f, "standard"),
            ScaleArg::MeanClip => write!(f, "mean-clip"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PatternArgs {
    /// Acquisition config (JSON) used for reciprocal-space conversion
    #[arg(long, env = "RHEEDSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Area-of-interest mask file; pixels outside are set to the pattern minimum
    #[arg(long)]
    pub aoi: Option<PathBuf>,

    /// Intensity preprocessing applied before segmentation
    #[arg(long, value_enum, default_value = "none")]
    pub scale: ScaleArg,

    /// Crop window "sx,sy,ex,ey" (rows sx..ex, columns sy..ey)
    #[arg(long)]
    pub crop: Option<String>,

    /// Threshold for building the mask from the pattern itself
    #[arg(long)]
    pub mask_threshold: Option<f64>,

    /// Minimum region area in pixels
    #[arg(long, default_value_t = 1)]
    pub min_area: usize,

    /// Collapse direction of region spectra
    #[arg(long, value_enum, default_value = "horizontal")]
    pub direction: DirectionArg,
}

/// 解析裁剪窗口 "sx,sy,ex,ey"
pub fn parse_crop(input: &str) -> Result<(usize, usize, usize, usize)> {
    let parts: Vec<usize> = input
        .split(',')
        .map(|s| s.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| RheedError::InvalidRange(input.to_string()))?;
    match parts.as_slice() {
        &[sx, sy, ex, ey] if sx < ex && sy < ey => Ok((sx, sy, ex, ey)),
        _ => Err(RheedError::InvalidRange(input.to_string())),
    }
}

// ─────────────────────────────────────────────────────────────
// 混合模型拟合
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ShapeArg {
    #[default]
    Gaussian,
    Lorentzian,
    Voigt,
}

impl From<ShapeArg> for PeakShape {
    fn from(s: ShapeArg) -> Self {
        match s {
            ShapeArg::Gaussian => PeakShape::Gaussian,
            ShapeArg::Lorentzian => PeakShape::Lorentzian,
            ShapeArg::Voigt => PeakShape::Voigt,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FitArgs {
    /// Peak shape of mixture components
    #[arg(long, value_enum, default_value = "gaussian")]
    pub shape: ShapeArg,

    /// Mixture fit timeout in seconds (0 disables the deadline)
    #[arg(long, default_value_t = 5.0)]
    pub fit_timeout: f64,

    /// Maximum Levenberg-Marquardt iterations
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Degree of the polynomial background (0 = constant offset)
    #[arg(long, default_value_t = 0)]
    pub background_degree: usize,

    /// Estimate initial widths from the half maximum within this many samples
    #[arg(long)]
    pub half_max_window: Option<usize>,
}

impl FitArgs {
    pub fn to_config(&self) -> Result<MixtureConfig> {
        let timeout = match self.fit_timeout {
            t if t == 0.0 => None,
            t => Some(Duration::try_from_secs_f64(t).map_err(|e| {
                RheedError::InvalidArgument(format!("invalid fit timeout {} s: {}", t, e))
            })?),
        };
        Ok(MixtureConfig {
            shape: self.shape.into(),
            background_degree: self.background_degree,
            guess: match self.half_max_window {
                Some(window) => GuessStrategy::HalfMaximum { window },
                None => GuessStrategy::SpanWidth,
            },
            fit: FitConfig::default().max_iter(self.max_iter).timeout(timeout),
        })
    }
}

// ─────────────────────────────────────────────────────────────
// 全局聚类
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// DBSCAN neighbourhood radius
    #[arg(long, default_value_t = 3.0)]
    pub eps: f64,

    /// DBSCAN minimum samples of a core point
    #[arg(long, default_value_t = 1)]
    pub min_samples: usize,

    /// Convert pixel spacings to reciprocal spacings before clustering (needs --config)
    #[arg(long, default_value_t = false)]
    pub convert_dist: bool,
}

impl ClusterArgs {
    pub fn to_config(&self) -> ClusterConfig {
        ClusterConfig::default()
            .eps(self.eps)
            .min_samples(self.min_samples)
            .convert_dist(self.convert_dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crop() {
        assert_eq!(parse_crop("0, 10, 100, 200").unwrap(), (0, 10, 100, 200));
        assert!(matches!(parse_crop("10,0,5,5"), Err(RheedError::InvalidRange(_))));
        assert!(parse_crop("1,2,3").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
    }

    #[test]
    fn test_fit_args() {
        let args = FitArgs {
            shape: ShapeArg::Voigt,
            fit_timeout: 0.0,
            max_iter: 50,
            background_degree: 1,
            half_max_window: Some(6),
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.shape, PeakShape::Voigt);
        assert_eq!(config.fit, FitConfig::default().max_iter(50).timeout(None));
        assert_eq!(config.guess, GuessStrategy::HalfMaximum { window: 6 });

        let timed = FitArgs {
            fit_timeout: 2.5,
            ..args.clone()
        };
        assert_eq!(
            timed.to_config().unwrap().fit,
            FitConfig::default()
                .max_iter(50)
                .timeout(Some(Duration::from_millis(2500)))
        );

        for t in [-1.0, f64::NAN, f64::INFINITY, 1e30] {
            let bad = FitArgs {
                fit_timeout: t,
                ..args.clone()
            };
            assert!(matches!(bad.to_config(), Err(RheedError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_clean_args() {
        let args = CleanArgs {
            no_smooth: true,
            sigma: 2.0,
            no_background: false,
            background_n: 3,
            no_normalize: false,
        };
        let config = args.to_config();
        assert!(!config.smooth);
        assert!(config.remove_background);
        assert_eq!(config.background_n, 3);
    }
}
