//! # spectrum 子命令 CLI 定义
//!
//! 对单条一维光谱做清洗、找峰、周期峰族检测与峰组划分。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/spectrum.rs`

use crate::cli::common::{CleanArgs, DistanceArgs, FitArgs, PeakArgs};

use clap::Args;
use std::path::PathBuf;

/// spectrum 子命令参数
#[derive(Args, Debug)]
pub struct SpectrumArgs {
    /// Input spectrum: two-column (coordinate, intensity) or single-column text
    pub input: PathBuf,

    /// Skip every cleaning step
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Replace samples above this value by quadratic interpolation (saturated detector)
    #[arg(long)]
    pub fill_truncated: Option<f64>,

    /// Print the signed pairwise peak distance matrix
    #[arg(long, default_value_t = false)]
    pub distance_matrix: bool,

    /// Decompose the spectrum into a mixture model over all detected peaks
    #[arg(long, default_value_t = false)]
    pub decompose: bool,

    /// Maximum relative standard error (%) before a fit is flagged
    #[arg(long, default_value_t = 100.0)]
    pub max_rel_err: f64,

    /// Maximum component FWHM before a fit is flagged
    #[arg(long)]
    pub max_fwhm: Option<f64>,

    /// Directory for CSV exports (families.csv, groups.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub clean: CleanArgs,

    #[command(flatten)]
    pub peaks: PeakArgs,

    #[command(flatten)]
    pub distance: DistanceArgs,

    #[command(flatten)]
    pub fit: FitArgs,
}
