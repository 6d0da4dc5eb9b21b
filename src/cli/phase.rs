//! # phase 子命令 CLI 定义
//!
//! 批量分析目录中的图样，全局聚类周期并生成强度表。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/phase.rs`

use crate::batch::collector::DEFAULT_PATTERNS;
use crate::cli::common::{CleanArgs, ClusterArgs, DistanceArgs, FitArgs, PatternArgs, PeakArgs};

use clap::Args;
use std::path::PathBuf;

/// phase 子命令参数
#[derive(Args, Debug)]
pub struct PhaseArgs {
    /// Directory containing the patterns
    pub input: PathBuf,

    /// Output directory for cluster_means.csv, intensity_map.csv and per-pattern family tables
    #[arg(short, long, default_value = "rheed_phase")]
    pub output: PathBuf,

    /// Suffix of the mask file next to each pattern ("run.png" -> "run_mask.png")
    #[arg(long, default_value = "_mask")]
    pub mask_suffix: String,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for pattern files (comma separated)
    #[arg(long, default_value = DEFAULT_PATTERNS)]
    pub pattern: String,

    /// Glob pattern for files to skip (comma separated)
    #[arg(long, default_value = "*_mask.*")]
    pub exclude: String,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Hide the per-file progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    #[command(flatten)]
    pub pattern_opts: PatternArgs,

    #[command(flatten)]
    pub clean: CleanArgs,

    #[command(flatten)]
    pub peaks: PeakArgs,

    #[command(flatten)]
    pub distance: DistanceArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[command(flatten)]
    pub fit: FitArgs,
}
