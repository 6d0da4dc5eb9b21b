//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `spectrum`: 单条一维光谱的周期分析
//! - `analyze`: 单张图样的分段流水线
//! - `phase`: 目录批量分析 + 全局聚类 + 强度表
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: common, spectrum, analyze, phase

pub mod analyze;
pub mod common;
pub mod phase;
pub mod spectrum;

use clap::{ArgAction, Parser, Subcommand};

/// rheedscope - RHEED 图样周期性检测与相强度分析
#[derive(Parser)]
#[command(name = "rheedscope")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Periodicity detection and phase-intensity mapping for RHEED patterns", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Detect periodic peak families in a 1-D spectrum
    Spectrum(spectrum::SpectrumArgs),

    /// Segment one masked pattern and detect periodic peak families
    Analyze(analyze::AnalyzeArgs),

    /// Cluster periodicities across a directory of patterns and map group intensity
    Phase(phase::PhaseArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_phase() {
        let cli = Cli::try_parse_from([
            "rheedscope",
            "-vv",
            "phase",
            "runs/",
            "--eps",
            "1.5",
            "--overlapping",
            "--direction",
            "v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Phase(args) => {
                assert_eq!(args.cluster.eps, 1.5);
                assert!(args.distance.overlapping);
                assert_eq!(args.pattern_opts.direction, common::DirectionArg::Vertical);
                assert_eq!(args.mask_suffix, "_mask");
            }
            _ => panic!("expected phase"),
        }
    }
}
