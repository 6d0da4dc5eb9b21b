//! # analyze 子命令 CLI 定义
//!
//! 对单张 RHEED 图样运行分段流水线：分割 → 投影 → 清洗 → 找峰 → 周期峰族 → 峰组。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze.rs`

use crate::cli::common::{CleanArgs, DistanceArgs, FitArgs, PatternArgs, PeakArgs};

use clap::Args;
use std::path::PathBuf;

/// analyze 子命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input pattern (PNG/TIFF image or delimited text grid)
    pub input: PathBuf,

    /// Binary mask file of the same shape (overrides --mask-threshold)
    #[arg(short, long)]
    pub mask: Option<PathBuf>,

    /// Decompose multi-peak regions with mixture models and report the components
    #[arg(long, default_value_t = false)]
    pub decompose: bool,

    /// Directory for CSV exports (families.csv, groups.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub pattern: PatternArgs,

    #[command(flatten)]
    pub clean: CleanArgs,

    #[command(flatten)]
    pub peaks: PeakArgs,

    #[command(flatten)]
    pub distance: DistanceArgs,

    #[command(flatten)]
    pub fit: FitArgs,
}
